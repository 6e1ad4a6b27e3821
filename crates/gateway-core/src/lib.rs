//! # Gateway Core
//!
//! The domain layer of the courier API gateway: error taxonomy, route table,
//! client identity and the rate limiter port. No web or network dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{GatewayError, RouteConfigError};
