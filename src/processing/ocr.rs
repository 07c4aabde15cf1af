use crate::models::CharacterStream;
use crate::processing::normalizer::NormalizedRaster;
use crate::utils::VerifyError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tesseract::Tesseract;

pub const DEFAULT_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 /-:";

/// Page layout assumption handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegmentation {
    Auto,
    SingleColumn,
    SingleBlock,
    SparseText,
}

impl From<PageSegmentation> for tesseract::PageSegMode {
    fn from(mode: PageSegmentation) -> Self {
        match mode {
            PageSegmentation::Auto => tesseract::PageSegMode::PsmAuto,
            PageSegmentation::SingleColumn => tesseract::PageSegMode::PsmSingleColumn,
            PageSegmentation::SingleBlock => tesseract::PageSegMode::PsmSingleBlock,
            PageSegmentation::SparseText => tesseract::PageSegMode::PsmSparseText,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory holding the `.traineddata` files. `None` uses the engine default.
    pub tessdata_path: Option<PathBuf>,
    /// Tesseract language set. Cards print Hindi next to English.
    pub languages: String,
    pub char_whitelist: String,
    pub page_segmentation: PageSegmentation,
    /// Deadline for a single recognition call.
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            tessdata_path: None,
            languages: "eng+hin".to_string(),
            char_whitelist: DEFAULT_WHITELIST.to_string(),
            page_segmentation: PageSegmentation::SingleBlock,
            timeout_ms: 30_000,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// An OCR backend. Called once per image from a worker thread.
pub trait TextEngine: Send + Sync {
    fn recognize(&self, png: &[u8], config: &OcrConfig) -> Result<String, VerifyError>;
}

/// Tesseract binding. A fresh engine instance is created for every call.
pub struct TesseractEngine;

impl TextEngine for TesseractEngine {
    fn recognize(&self, png: &[u8], config: &OcrConfig) -> Result<String, VerifyError> {
        let mut temp_file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| VerifyError::OcrError(format!("Failed to create temp file: {}", e)))?;

        temp_file
            .write_all(png)
            .map_err(|e| VerifyError::OcrError(format!("Failed to write to temp file: {}", e)))?;

        let image_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| VerifyError::OcrError("Failed to convert path to string".to_string()))?;

        let datapath = match &config.tessdata_path {
            Some(path) => Some(path.to_str().ok_or_else(|| {
                VerifyError::ConfigError(format!("tessdata path is not UTF-8: {:?}", path))
            })?),
            None => None,
        };

        let mut tess = Tesseract::new(datapath, Some(config.languages.as_str()))
            .map_err(|e| VerifyError::OcrError(format!("Tesseract init error: {}", e)))?
            .set_variable("tessedit_char_whitelist", &config.char_whitelist)
            .map_err(|e| VerifyError::OcrError(format!("Tesseract set variable error: {}", e)))?;

        tess.set_page_seg_mode(config.page_segmentation.into());

        let mut tess = tess
            .set_image(image_path)
            .map_err(|e| VerifyError::OcrError(format!("Tesseract set image error: {}", e)))?;

        tess.get_text()
            .map_err(|e| VerifyError::OcrError(format!("Tesseract error: {}", e)))
    }
}

/// Runs the OCR engine over a normalized raster and cleans its output.
pub struct TextRecognizer {
    config: OcrConfig,
    engine: Arc<dyn TextEngine>,
}

impl TextRecognizer {
    pub fn new(config: OcrConfig, engine: Arc<dyn TextEngine>) -> Self {
        TextRecognizer { config, engine }
    }

    /// Never fails: a missing raster, an engine error or a blown deadline all give an empty stream.
    ///
    /// The engine cannot be interrupted. After a deadline expires its worker thread is detached
    /// and runs to completion, so repeated stuck calls each hold a thread until the engine returns.
    pub fn recognize(&self, raster: Option<&NormalizedRaster>) -> CharacterStream {
        let Some(raster) = raster else {
            debug!("No raster to recognize");
            return CharacterStream::empty();
        };

        let png = match raster.to_png() {
            Ok(png) => png,
            Err(e) => {
                warn!("Skipping OCR: {}", e);
                return CharacterStream::empty();
            }
        };

        match self.run_with_deadline(png) {
            Ok(text) => {
                let stream = CharacterStream::parse(&text);
                info!("OCR produced {} line(s)", stream.lines().len());
                debug!("OCR text:\n{}", stream.text());
                stream
            }
            Err(e) => {
                warn!("OCR failed, treating text as unknown: {}", e);
                CharacterStream::empty()
            }
        }
    }

    fn run_with_deadline(&self, png: Vec<u8>) -> Result<String, VerifyError> {
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let (sender, receiver) = mpsc::channel();

        thread::Builder::new()
            .name("ocr".to_string())
            .spawn(move || {
                // The receiver is gone if the deadline already passed.
                let _ = sender.send(engine.recognize(&png, &config));
            })?;

        match receiver.recv_timeout(self.config.timeout()) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(VerifyError::OcrError(format!(
                "recognition exceeded {} ms",
                self.config.timeout_ms
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(VerifyError::OcrError(
                "recognition worker exited without a result".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::normalizer::{ImageNormalizer, NormalizerConfig};
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct CannedEngine(&'static str);

    impl TextEngine for CannedEngine {
        fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, VerifyError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingEngine;

    impl TextEngine for FailingEngine {
        fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, VerifyError> {
            Err(VerifyError::OcrError("engine unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct StuckEngine {
        finished: AtomicBool,
    }

    impl TextEngine for StuckEngine {
        fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, VerifyError> {
            thread::sleep(Duration::from_millis(300));
            self.finished.store(true, Ordering::SeqCst);
            Ok("TOO LATE".to_string())
        }
    }

    fn blank_raster() -> NormalizedRaster {
        let normalizer = ImageNormalizer::new(NormalizerConfig {
            min_width: 8,
            ..NormalizerConfig::default()
        });
        normalizer.normalize_image(&DynamicImage::ImageLuma8(GrayImage::from_pixel(
            16,
            8,
            Luma([255u8]),
        )))
    }

    #[test]
    fn test_recognized_text_is_cleaned() {
        let recognizer = TextRecognizer::new(
            OcrConfig::default(),
            Arc::new(CannedEngine("  JOHN  DOE\n\nDOB : 01/02/1990 |\nMALE\n")),
        );
        let stream = recognizer.recognize(Some(&blank_raster()));
        assert_eq!(stream.lines(), &["JOHN DOE", "DOB : 01/02/1990", "MALE"]);
    }

    #[test]
    fn test_missing_raster_gives_empty_stream() {
        let recognizer = TextRecognizer::new(OcrConfig::default(), Arc::new(CannedEngine("X")));
        assert!(recognizer.recognize(None).is_empty());
    }

    #[test]
    fn test_engine_error_gives_empty_stream() {
        let recognizer = TextRecognizer::new(OcrConfig::default(), Arc::new(FailingEngine));
        assert!(recognizer.recognize(Some(&blank_raster())).is_empty());
    }

    #[test]
    fn test_deadline_expiry_gives_empty_stream() {
        let config = OcrConfig {
            timeout_ms: 20,
            ..OcrConfig::default()
        };
        let recognizer = TextRecognizer::new(config, Arc::new(StuckEngine::default()));
        assert!(recognizer.recognize(Some(&blank_raster())).is_empty());
    }

    #[test]
    fn test_expired_worker_still_runs_to_completion() {
        let engine = Arc::new(StuckEngine::default());
        let config = OcrConfig {
            timeout_ms: 20,
            ..OcrConfig::default()
        };
        let recognizer = TextRecognizer::new(config, engine.clone());

        assert!(recognizer.recognize(Some(&blank_raster())).is_empty());
        assert!(!engine.finished.load(Ordering::SeqCst));

        thread::sleep(Duration::from_millis(1000));
        assert!(engine.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_config_reads_bilingual_block() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "eng+hin");
        assert_eq!(config.page_segmentation, PageSegmentation::SingleBlock);
        assert!(config.char_whitelist.contains('/'));
        assert!(!config.char_whitelist.contains('.'));
    }
}
