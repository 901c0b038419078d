//! HTTP front end for a bits chat session.
//!
//! Exposes the session (chat, mode toggles, memory) and document ingestion
//! as a small JSON API on top of axum.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
