pub mod models;
pub mod resolver;

pub use models::{BloodGroup, Role, UserProfile};
pub use resolver::{classify, ProfileResolution, ProfileResolver, ResolvedProfile, RoleCounts};
