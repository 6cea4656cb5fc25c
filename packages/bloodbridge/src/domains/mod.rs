pub mod matching;
pub mod notifications;
pub mod profiles;
pub mod requests;
pub mod responses;
pub mod seen;
