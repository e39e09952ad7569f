//! Client for the greet service.
//!
//! The interesting part is [`tasks::run_duplex`], which drives one bidirectional call: requests
//! are sent from their own task while responses are consumed in place, and the call is finished
//! once the inbound side has ended.
pub mod client;
pub mod config;
pub mod session;
pub mod tasks;
