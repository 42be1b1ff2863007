//! Shared types for the Subgate entitlement engine.
//!
//! The vocabulary every other crate speaks: the key identifying an
//! entitlement, the billing environment a proof was issued in, the
//! canonical event decoded from a verified proof, and the
//! epoch-millisecond timestamps the billing platform uses on the wire.

mod environment;
mod event;
mod key;
mod millis;

pub use environment::{Environment, ParseEnvironmentError};
pub use event::{EntitlementEvent, EventKind};
pub use key::EntitlementKey;
pub use millis::EpochMillis;
