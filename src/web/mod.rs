//! Web server module
//!
//! JSON API over search, place details, summaries and the shop library.

mod handlers;
mod routes;
mod state;

pub use handlers::ApiError;
pub use routes::create_router;
pub use state::AppState;
