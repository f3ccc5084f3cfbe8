//! Strata API crate - axum HTTP search service.
//!
//! Serves text and vector search over a loaded store, store info, health,
//! and an in-place reload of the store directory.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::{AppState, StoreHandle};
