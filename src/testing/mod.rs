//! Testing utilities and mock implementations
//!
//! Lets bots be exercised without a running MQTT broker.

pub mod mocks;

pub use mocks::*;
