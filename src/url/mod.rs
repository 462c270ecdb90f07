//! Address utilities
//!
//! Addresses are opaque absolute URL strings to the engine. These helpers are
//! used by rules: origin extraction for pacing and href resolution for link
//! discovery.

mod origin;
mod resolve;

pub use origin::{origin_of, origin_of_url};
pub use resolve::resolve_link;
