use crate::models::{ClassifierLabel, Detection};
use crate::utils::VerifyError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// External authenticity model. Returns every detection it made on the image.
pub trait Classifier: Send + Sync {
    fn infer(&self, image_bytes: &[u8]) -> Result<Vec<Detection>, VerifyError>;
}

/// Highest-confidence detection, first one on ties. Nothing detected means `Undetected` at 0.0.
pub fn best_detection(detections: &[Detection]) -> Detection {
    detections
        .iter()
        .fold(None, |best: Option<&Detection>, candidate| match best {
            Some(current) if current.confidence >= candidate.confidence => Some(current),
            _ => Some(candidate),
        })
        .cloned()
        .unwrap_or_else(Detection::none)
}

/// Runs the classifier and never fails: errors degrade to the empty detection.
pub fn classify(classifier: &dyn Classifier, image_bytes: &[u8]) -> Detection {
    match classifier.infer(image_bytes) {
        Ok(detections) => {
            debug!("Classifier returned {} detection(s)", detections.len());
            best_detection(&detections)
        }
        Err(e) => {
            warn!("Classifier failed, assuming no detection: {}", e);
            Detection::none()
        }
    }
}

/// Detection as printed by an external detector, e.g. a YOLO results frame dumped to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDetection {
    #[serde(alias = "name", alias = "class")]
    label: String,
    confidence: f32,
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        let detection = Detection::from_class_name(&raw.label, raw.confidence);
        if detection.label == ClassifierLabel::Undetected {
            debug!("Unrecognized classifier label: {}", raw.label);
        }
        detection
    }
}

/// Shells out to a detector program. The image path is appended as the last argument and the
/// program must print a JSON array of `{"label", "confidence"}` objects.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: PathBuf) -> Self {
        CommandClassifier {
            program,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn parse_output(stdout: &str) -> Result<Vec<Detection>, VerifyError> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<RawDetection> = serde_json::from_str(trimmed).map_err(|e| {
            VerifyError::ClassifierError(format!("Failed to parse detector output: {}", e))
        })?;
        Ok(raw.into_iter().map(Detection::from).collect())
    }
}

impl Classifier for CommandClassifier {
    fn infer(&self, image_bytes: &[u8]) -> Result<Vec<Detection>, VerifyError> {
        let suffix = image_suffix(image_bytes);
        let mut temp_file = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| VerifyError::ClassifierError(format!("Failed to create temp file: {}", e)))?;
        temp_file.write_all(image_bytes).map_err(|e| {
            VerifyError::ClassifierError(format!("Failed to write to temp file: {}", e))
        })?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(temp_file.path())
            .output()
            .map_err(|e| {
                VerifyError::ClassifierError(format!(
                    "Failed to run detector {:?}: {}",
                    self.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VerifyError::ClassifierError(format!(
                "Detector exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Self::parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// File suffix matching the payload's sniffed format. Detectors pick their loader by extension.
fn image_suffix(image_bytes: &[u8]) -> String {
    let extension = image::guess_format(image_bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png");
    format!(".{}", extension)
}

/// Returns the same detections for every image.
#[derive(Debug, Clone, Default)]
pub struct FixedClassifier {
    detections: Vec<Detection>,
}

impl FixedClassifier {
    pub fn new(detections: Vec<Detection>) -> Self {
        FixedClassifier { detections }
    }

    pub fn single(label: ClassifierLabel, confidence: f32) -> Self {
        FixedClassifier::new(vec![Detection::new(label, confidence)])
    }
}

impl Classifier for FixedClassifier {
    fn infer(&self, _image_bytes: &[u8]) -> Result<Vec<Detection>, VerifyError> {
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn infer(&self, _image_bytes: &[u8]) -> Result<Vec<Detection>, VerifyError> {
            Err(VerifyError::ClassifierError("model not loaded".to_string()))
        }
    }

    #[test]
    fn test_best_detection_picks_highest_confidence() {
        let detections = vec![
            Detection::new(ClassifierLabel::Fake, 0.41),
            Detection::new(ClassifierLabel::Real, 0.87),
            Detection::new(ClassifierLabel::Fake, 0.62),
        ];
        assert_eq!(
            best_detection(&detections),
            Detection::new(ClassifierLabel::Real, 0.87)
        );
    }

    #[test]
    fn test_best_detection_keeps_first_on_tie() {
        let detections = vec![
            Detection::new(ClassifierLabel::Fake, 0.5),
            Detection::new(ClassifierLabel::Real, 0.5),
        ];
        assert_eq!(best_detection(&detections).label, ClassifierLabel::Fake);
    }

    #[test]
    fn test_no_detection_degrades_to_default() {
        assert_eq!(best_detection(&[]), Detection::none());
        assert_eq!(classify(&FixedClassifier::default(), b"img"), Detection::none());
        assert_eq!(classify(&BrokenClassifier, b"img"), Detection::none());
    }

    #[test]
    fn test_parse_detector_output() {
        let detections = CommandClassifier::parse_output(
            r#"[{"name": "real", "confidence": 0.91}, {"label": "FAKE", "confidence": 0.2}]"#,
        )
        .unwrap();
        assert_eq!(
            detections,
            vec![
                Detection::new(ClassifierLabel::Real, 0.91),
                Detection::from_class_name("FAKE", 0.2),
            ]
        );
        assert!(CommandClassifier::parse_output("  \n").unwrap().is_empty());
        assert!(CommandClassifier::parse_output("not json").is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let detections =
            CommandClassifier::parse_output(r#"[{"class": "real", "confidence": 1.7}]"#).unwrap();
        assert_eq!(detections[0].confidence, 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_classifier_runs_program() {
        let classifier = CommandClassifier::new(PathBuf::from("sh")).with_args(vec![
            "-c".to_string(),
            r#"echo '[{"name":"fake","confidence":0.66}]'"#.to_string(),
        ]);
        let detections = classifier.infer(b"bytes").unwrap();
        assert_eq!(detections, vec![Detection::new(ClassifierLabel::Fake, 0.66)]);
    }

    fn png_bytes() -> Vec<u8> {
        let mut buffer = Vec::new();
        image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 4))
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_temp_suffix_follows_image_format() {
        assert_eq!(image_suffix(&png_bytes()), ".png");
        assert_eq!(image_suffix(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), ".jpg");
        assert_eq!(image_suffix(b"unknown"), ".png");
    }

    #[cfg(unix)]
    #[test]
    fn test_detector_sees_image_extension() {
        // The script only loads files it recognizes by extension, like YOLO's image loader.
        let classifier = CommandClassifier::new(PathBuf::from("sh")).with_args(vec![
            "-c".to_string(),
            r#"case "$0" in *.png|*.jpg|*.jpeg) echo '[{"name":"real","confidence":0.8}]';; *) exit 2;; esac"#
                .to_string(),
        ]);
        assert_eq!(
            classify(&classifier, &png_bytes()),
            Detection::new(ClassifierLabel::Real, 0.8)
        );
    }

    #[test]
    fn test_unknown_class_name_is_kept() {
        let detections =
            CommandClassifier::parse_output(r#"[{"name": "tampered", "confidence": 0.91}]"#)
                .unwrap();
        assert_eq!(detections[0].label, ClassifierLabel::Undetected);
        assert_eq!(detections[0].class_name, "tampered");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_classifier_failure_is_reported() {
        let classifier = CommandClassifier::new(PathBuf::from("sh"))
            .with_args(vec!["-c".to_string(), "exit 3".to_string()]);
        assert!(matches!(
            classifier.infer(b"bytes"),
            Err(VerifyError::ClassifierError(_))
        ));
        assert_eq!(classify(&classifier, b"bytes"), Detection::none());
    }
}
