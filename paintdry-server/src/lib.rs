//! # Paintdry Server
//!
//! Read-only JSON views over the resource store, plus the wiring shared by
//! the `paintdry` binary's update commands.

pub mod app_state;
pub mod errors;
pub mod handlers;
pub mod routes;

pub use app_state::AppState;
pub use errors::{AppError, AppResult};
pub use routes::create_router;
