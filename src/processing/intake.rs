use crate::utils::VerifyError;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Lower-case file extensions accepted for upload.
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        IntakeConfig {
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// An accepted upload, ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub document_id: String,
    pub digest: String,
    pub bytes: Vec<u8>,
}

/// Gatekeeper in front of the pipeline: filename, extension and size checks.
pub struct DocumentIntake {
    config: IntakeConfig,
}

impl DocumentIntake {
    pub fn new(config: IntakeConfig) -> Self {
        DocumentIntake { config }
    }

    pub fn accept(&self, filename: &str, bytes: Vec<u8>) -> Result<Upload, VerifyError> {
        let document_id = secure_filename(filename);
        if document_id.is_empty() {
            return Err(VerifyError::IntakeError(format!(
                "unusable file name: {:?}",
                filename
            )));
        }

        let extension = Path::new(&document_id)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !self.config.allowed_extensions.iter().any(|allowed| allowed == &extension) {
            return Err(VerifyError::IntakeError(format!(
                "file type not allowed: {}",
                document_id
            )));
        }

        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(VerifyError::IntakeError(format!(
                "{} is {} bytes, limit is {}",
                document_id,
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let digest = format!("{:x}", Sha256::digest(&bytes));
        debug!("Accepted upload {} ({} bytes, sha256 {})", document_id, bytes.len(), digest);

        Ok(Upload {
            document_id,
            digest,
            bytes,
        })
    }

    pub fn accept_path(&self, path: &Path) -> Result<Upload, VerifyError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| VerifyError::IntakeError(format!("no file name in {:?}", path)))?;

        let size = std::fs::metadata(path)?.len();
        if size > self.config.max_upload_bytes {
            return Err(VerifyError::IntakeError(format!(
                "{} is {} bytes, limit is {}",
                filename, size, self.config.max_upload_bytes
            )));
        }

        let bytes = std::fs::read(path)?;
        self.accept(filename, bytes)
    }
}

/// Reduces a client-supplied file name to a safe, flat ASCII identifier.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn intake() -> DocumentIntake {
        DocumentIntake::new(IntakeConfig::default())
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("my card.JPG"), "my_card.JPG");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\scan (1).png"), "scan_1.png");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_accepts_allowed_extension_case_insensitively() {
        let upload = intake().accept("Card.JPEG", vec![1, 2, 3]).unwrap();
        assert_eq!(upload.document_id, "Card.JPEG");
        assert_eq!(
            upload.digest,
            "039058c6f2c0cb492c533b0a4d14ef77cc0f78abccced5287d84a1a2011cfb81"
        );
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        assert!(matches!(
            intake().accept("card.gif", vec![0]),
            Err(VerifyError::IntakeError(_))
        ));
        assert!(matches!(
            intake().accept("card", vec![0]),
            Err(VerifyError::IntakeError(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let small = DocumentIntake::new(IntakeConfig {
            max_upload_bytes: 4,
            ..IntakeConfig::default()
        });
        assert!(small.accept("card.png", vec![0; 4]).is_ok());
        assert!(matches!(
            small.accept("card.png", vec![0; 5]),
            Err(VerifyError::IntakeError(_))
        ));
    }

    #[test]
    fn test_accept_path_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"png-ish").unwrap();
        let upload = intake().accept_path(file.path()).unwrap();
        assert_eq!(upload.bytes, b"png-ish");
        assert!(upload.document_id.ends_with(".png"));
    }
}
