// Bloodbridge - matching and notification engine
//
// Connects blood donors with people requesting blood: classifies users,
// keeps live queries over matching requests and responses, records
// accept/decline responses, tracks seen state and fans out notifications.
//
// Infrastructure (store, push, cache, clock) sits behind kernel traits;
// engine logic lives per-domain in domains/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
