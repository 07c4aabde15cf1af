use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Unprocessable image: {0}")]
    UnprocessableImage(String),
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("OCR error: {0}")]
    OcrError(String),
    #[error("Classifier error: {0}")]
    ClassifierError(String),
    #[error("Upload rejected: {0}")]
    IntakeError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
