pub mod config;
pub mod document_verifier;
pub mod models;
pub mod processing;
pub mod storage;
pub mod utils;
pub mod validation;
pub mod verification;

pub use config::VerifierConfig;
pub use document_verifier::DocumentVerifier;
