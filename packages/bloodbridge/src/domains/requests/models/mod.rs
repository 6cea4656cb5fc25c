pub mod request;
pub mod response;
pub mod timestamp;

pub use request::*;
pub use response::*;
pub use timestamp::parse_timestamp;
