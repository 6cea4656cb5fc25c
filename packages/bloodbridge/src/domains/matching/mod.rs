pub mod engine;
pub mod session;
pub mod state;
pub mod views;

pub use engine::MatchQueryEngine;
pub use session::MatchingSession;
pub use state::{CommitOutcome, FeedStatus, FeedView, OptimisticRemoval};
pub use views::{compute_view, ComputedView, FeedItems, FeedParams, MatchedRequest, ResponseItem};
