//! Read-only JSON API over stored Chronicle issues.
//!
//! Exposes an axum [`Router`] backed by any
//! [`chronicle_core::store::IssueStore`]. Auth and TLS are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", chronicle_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod issues;

use std::sync::Arc;

use axum::{Router, routing::get};
use chronicle_core::store::IssueStore;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build the API router for `store`.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: IssueStore + 'static,
{
  Router::new()
    .route("/issues", get(issues::list::<S>))
    .route("/issues/{tracker}/{id}", get(issues::get_one::<S>))
    .route("/issues/{tracker}/{id}/state", get(issues::state::<S>))
    .route("/issues/{tracker}/{id}/timeline", get(issues::timeline::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}
