pub mod actions;
pub mod gate;
pub mod models;

pub use actions::{publish_request, PublishedRequest};
pub use gate::{CompletenessGate, GateRecord};
pub use models::{
    BloodRequest, DonorResponse, RawBloodRequest, RawDonorResponse, RequestDraft, RequestStatus,
    ResponseStatus,
};
