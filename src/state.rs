use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::providers::Providers;
use crate::rate_limit::AttemptLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub providers: Providers,
    pub login_limiter: AttemptLimiter,
    pub activation_limiter: AttemptLimiter,
}
