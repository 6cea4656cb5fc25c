mod publish_request;

pub use publish_request::{publish_request, validate_draft, PublishedRequest};
