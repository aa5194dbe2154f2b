use crate::error::TransformFailure;

/// Outcome counts and attribute coverage of one `apply` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<TransformFailure>,
    pub mapped: Vec<String>,
    pub unmapped: Vec<String>,
    pub aggregated: Vec<String>,
    pub combined: Vec<String>,
}

impl TransformReport {
    /// Every record transformed and every target attribute mapped.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.unmapped.is_empty()
    }
}
