//! Core domain types, condition grammar and ports for the Eventide choreography engine.

pub mod condition;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod ports;
pub mod processor;

pub use condition::*;
pub use domain::*;
pub use envelope::*;
pub use error::*;
pub use ports::*;
pub use processor::*;
