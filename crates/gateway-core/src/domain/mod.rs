//! Domain model - routing rules and client identity.

mod client;
mod route;

pub use client::{ProxyTrust, UNKNOWN_CLIENT};
pub use route::{CATCH_ALL, Destination, RouteRule, RouteTable};
