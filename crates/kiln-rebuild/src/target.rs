use std::sync::Arc;

/// One content item whose derived data the scheduler rebuilds.
pub trait DerivedTarget: Send + Sync {
    /// Group (typically the owning namespace) used for the warm-up allow-list.
    fn group(&self) -> &str;

    /// Expensive precompute run on the warm-up pool. Default: nothing.
    fn warm_up(&self) {}

    /// Rebuild this item's derived data. Never interrupted mid-call.
    fn rebuild(&self);
}

/// Produces the full, current target list at trigger time.
pub trait TargetSource: Send + Sync {
    fn snapshot(&self) -> Vec<Arc<dyn DerivedTarget>>;
}

impl<F> TargetSource for F
where
    F: Fn() -> Vec<Arc<dyn DerivedTarget>> + Send + Sync,
{
    fn snapshot(&self) -> Vec<Arc<dyn DerivedTarget>> {
        self()
    }
}
