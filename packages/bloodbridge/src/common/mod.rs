// Common types and utilities shared across the engine

pub mod clock;
pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity_ids::*;
pub use errors::{EngineError, EngineResult};
pub use id::Id;
