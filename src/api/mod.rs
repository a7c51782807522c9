//! HTTP surface: public health probe plus the authenticated /api/v1
//! capture, clarify, pending, letters and journal routes.

pub mod handlers;
pub mod middleware;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::config::Config;
use crate::db::Store;
use crate::llm::OllamaClient;
use crate::narrator::Narrator;
use crate::scheduler::ideas::IdeaExpander;
use crate::scheduler::Scheduler;
use crate::vault::Vault;
use middleware::RateLimiter;

/// Requests per actor per minute.
const RATE_LIMIT: usize = 60;

pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub vault: Arc<Vault>,
    pub llm: Arc<OllamaClient>,
    pub narrator: Arc<Narrator>,
    pub idea_expander: Arc<IdeaExpander>,
    /// Set once the scheduler is up; the manual letter triggers need it.
    pub scheduler: OnceLock<Arc<Scheduler>>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<Store>,
        vault: Arc<Vault>,
        llm: Arc<OllamaClient>,
        narrator: Arc<Narrator>,
    ) -> Self {
        Self {
            idea_expander: Arc::new(IdeaExpander::new(llm.clone(), vault.clone())),
            config,
            store,
            vault,
            llm,
            narrator,
            scheduler: OnceLock::new(),
            rate_limiter: RateLimiter::new(RATE_LIMIT, Duration::from_secs(60)),
        }
    }
}

/// Assembles the router: `/health` is public; everything under `/api/v1`
/// goes through bearer auth and the rate limiter.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/capture", post(handlers::capture))
        .route("/clarify", post(handlers::clarify))
        .route("/pending", get(handlers::pending))
        .route("/letters", get(handlers::letters))
        .route("/journal/update", post(handlers::journal_update))
        .route("/journal/status", get(handlers::journal_status))
        .route("/test/daily", post(handlers::test_daily))
        .route("/test/weekly", post(handlers::test_weekly))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
}
