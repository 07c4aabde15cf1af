pub mod extractors;
pub mod intake;
pub mod normalizer;
pub mod ocr;

pub use extractors::{ExtractorConfig, FieldExtractor, NameFilter};
pub use intake::{DocumentIntake, IntakeConfig, Upload};
pub use normalizer::{ImageNormalizer, NormalizedRaster, NormalizerConfig};
pub use ocr::{OcrConfig, PageSegmentation, TesseractEngine, TextEngine, TextRecognizer};
