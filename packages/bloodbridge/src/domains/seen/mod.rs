pub mod debounce;
pub mod tracker;

pub use debounce::MinIntervalGate;
pub use tracker::{MarkSeenOutcome, SeenStateTracker};
