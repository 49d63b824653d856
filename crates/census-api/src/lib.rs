//! JSON REST API for census submissions.
//!
//! Exposes an axum [`Router`] backed by any [`CensusStore`]. Lock checks on
//! writes live here, not in the store. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", census_api::api_router(state))
//! ```

pub mod auth;
pub mod error;
pub mod facts;
pub mod reports;
pub mod submissions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use census_core::{policy::OrchestrationPolicy, store::CensusStore};

pub use auth::{Actor, AuthConfig};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub policy: Arc<OrchestrationPolicy>,
  pub auth:   Arc<AuthConfig>,
}

// Not derived: the derive would demand `S: Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      policy: Arc::clone(&self.policy),
      auth:   Arc::clone(&self.auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: CensusStore + 'static,
{
  Router::new()
    .route("/dimensions", get(reports::dimensions::<S>))
    // Ledger
    .route("/submissions", get(submissions::list::<S>))
    .route("/submissions/{id}", delete(submissions::delete_one::<S>))
    .route("/submissions/{id}/lock", patch(submissions::set_lock::<S>))
    // Per submission type
    .route(
      "/{type}/facts",
      get(facts::read::<S>)
        .post(facts::create::<S>)
        .put(facts::update::<S>)
        .delete(facts::delete_year::<S>),
    )
    .route("/{type}/summary", get(reports::summary::<S>))
    .route("/{type}/completion", get(reports::completion::<S>))
    .route("/{type}/lock", get(submissions::is_locked::<S>))
    .route("/{type}/final-submit", post(submissions::final_submit::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
