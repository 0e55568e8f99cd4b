use std::sync::Arc;

use crate::{
    auth::verifier::TokenVerifier,
    config::AppConfig,
    db::{DbPool, OrmConn},
    middleware::rate_limit::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    pub verifier: Arc<dyn TokenVerifier>,
    pub limiter: Arc<RateLimiter>,
}
