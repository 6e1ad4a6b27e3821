//! # Gateway Shared
//!
//! Wire types shared between the API gateway and the services behind it.

pub mod response;

pub use response::{ErrorEnvelope, MessageResponse, OriginalError};
