pub mod expo;
pub mod serde_ext;

pub use expo::*;
pub use serde_ext::*;
