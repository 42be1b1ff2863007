//! HTTP surface for the Subgate entitlement engine.
//!
//! The handlers are thin: verify the proof, decode it into a canonical
//! event, reconcile it against the store, and report the result. All
//! policy lives in the crates underneath; this crate only maps their
//! results onto status codes and wire shapes.

mod config;
mod error;
mod routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{build_router, ActivateResponse, AppState, EntitlementResponse};
