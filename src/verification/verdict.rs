use crate::models::{ClassifierLabel, VerificationVerdict};
use serde::{Deserialize, Serialize};

/// Decision rule used to fuse the classifier output with the format check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// `Verified` only when the classifier says real and the number is well formed.
    /// Everything else is `Accepted`.
    #[default]
    Conjunctive,
    /// Conjunctive, plus `Rejected` for a confident fake detection.
    RejectForgeries { min_confidence: f32 },
}

/// Resolves the final verdict. Stateless.
pub struct VerdictResolver {
    policy: VerdictPolicy,
}

impl VerdictResolver {
    pub fn new(policy: VerdictPolicy) -> Self {
        VerdictResolver { policy }
    }

    pub fn resolve(
        &self,
        label: ClassifierLabel,
        confidence: f32,
        identity_number_valid: bool,
    ) -> VerificationVerdict {
        if let VerdictPolicy::RejectForgeries { min_confidence } = self.policy {
            if label == ClassifierLabel::Fake && confidence >= min_confidence {
                return VerificationVerdict::Rejected;
            }
        }

        if label == ClassifierLabel::Real && identity_number_valid {
            VerificationVerdict::Verified
        } else {
            VerificationVerdict::Accepted
        }
    }

    /// Same as [`resolve`](Self::resolve) for a label still in string form.
    pub fn resolve_label(
        &self,
        label: &str,
        confidence: f32,
        identity_number_valid: bool,
    ) -> VerificationVerdict {
        self.resolve(ClassifierLabel::parse(label), confidence, identity_number_valid)
    }
}

impl Default for VerdictResolver {
    fn default() -> Self {
        VerdictResolver::new(VerdictPolicy::default())
    }
}
