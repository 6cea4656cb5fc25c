//! Typed ID definitions for the documents this engine reads and writes.
//!
//! ```rust
//! use bloodbridge_core::common::{RequestId, UserId};
//!
//! let user_id = UserId::new();
//! let request_id = RequestId::new();
//! // let wrong: RequestId = user_id; // compile error
//! # let _ = (user_id, request_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for users (donors and receivers share one profile collection).
pub struct User;

/// Marker type for blood requests.
pub struct BloodRequest;

/// Marker type for donation records written when a donor accepts.
pub struct Donation;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;

pub type RequestId = Id<BloodRequest>;

pub type DonationId = Id<Donation>;
