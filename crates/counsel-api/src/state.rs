//! Shared application state.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tracing::info;

use counsel_crypto::TokenIssuer;
use counsel_db::Database;
use counsel_inference::EmotionClassifier;
use counsel_rag::RagEngine;

use crate::config::ServerConfig;
use crate::services::{AccountService, EphemeralStore, Mailer};

/// Type alias for the global rate limiter.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub rag: Arc<RagEngine>,
    pub classifier: Arc<dyn EmotionClassifier>,
    pub tokens: TokenIssuer,
    pub store: EphemeralStore,
    pub mailer: Arc<dyn Mailer>,
    pub accounts: AccountService,
    pub config: Arc<ServerConfig>,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(
        db: Database,
        rag: Arc<RagEngine>,
        classifier: Arc<dyn EmotionClassifier>,
        store: EphemeralStore,
        mailer: Arc<dyn Mailer>,
        config: ServerConfig,
    ) -> Self {
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes());
        let accounts = AccountService::new(
            db.users.clone(),
            store.clone(),
            mailer.clone(),
            tokens.clone(),
            config.base_url.clone(),
        );
        let rate_limiter = build_rate_limiter(&config);
        Self {
            db,
            rag,
            classifier,
            tokens,
            store,
            mailer,
            accounts,
            config: Arc::new(config),
            rate_limiter,
        }
    }
}

fn build_rate_limiter(config: &ServerConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.rate_limit_enabled {
        info!("Rate limiting disabled");
        return None;
    }
    let requests = u32::try_from(config.rate_limit_requests)
        .ok()
        .and_then(NonZeroU32::new)
        .unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(config.rate_limit_period / requests.get())?
        .allow_burst(requests);
    info!(
        "Rate limiting enabled: {} requests per {}s",
        requests,
        config.rate_limit_period.as_secs()
    );
    Some(Arc::new(RateLimiter::direct(quota)))
}
