pub mod classifier;
pub mod verdict;

pub use classifier::{best_detection, classify, Classifier, CommandClassifier, FixedClassifier};
pub use verdict::{VerdictPolicy, VerdictResolver};
