//! Query side of the timeline views.

/// A view the API can query and report on.
pub trait ReadModel: Send + Sync {
    /// Stable view name.
    fn name(&self) -> &'static str;

    /// Number of routing slips or activities the view currently holds.
    fn count(&self) -> usize;
}
