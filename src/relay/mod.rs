//! Routing between cooperating relay hosts.

pub mod attachments;
pub mod probe;
pub mod proxy;
pub mod router;

pub use proxy::SignedRequest;
pub use router::{RelayRouter, RouteOutcome, RouterOptions};
