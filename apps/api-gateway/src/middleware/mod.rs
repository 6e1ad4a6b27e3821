//! Policy middleware: the ordered stage chain and the error responder.

pub mod body_limit;
pub mod cookies;
pub mod cors;
pub mod error;
pub mod pipeline;
pub mod proxy_trust;
pub mod rate_limit;

pub use cors::CorsConfig;
pub use error::{ErrorResponder, OperatingMode};
pub use pipeline::{PolicyChain, PolicyConfig, RequestContext};
