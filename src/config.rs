use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Verify signatures against the issuer's published key-set.
    Jwks,
    /// Verify signatures with a locally shared secret.
    Hmac,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub hmac_secret: Option<String>,
    pub jwks_ttl: Duration,
    pub jwks_cache_capacity: usize,
    /// Skip verification entirely. Ignored outside the development stage.
    pub bypass: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub stage: Stage,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let stage = match env::var("APP_STAGE").as_deref() {
            Ok("production") | Ok("prod") => Stage::Production,
            _ => Stage::Development,
        };

        let mode = match env::var("AUTH_MODE").as_deref() {
            Ok("hmac") => AuthMode::Hmac,
            _ => AuthMode::Jwks,
        };

        let auth = AuthConfig {
            mode,
            issuer: env::var("AUTH_ISSUER").ok(),
            audience: env::var("AUTH_AUDIENCE").ok(),
            hmac_secret: env::var("AUTH_HMAC_SECRET").ok(),
            jwks_ttl: Duration::from_secs(
                env::var("AUTH_JWKS_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(600),
            ),
            jwks_cache_capacity: env::var("AUTH_JWKS_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(32),
            bypass: env::var("AUTH_BYPASS")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
        };

        let rate_limit = RateLimitConfig {
            enabled: env::var("RATE_LIMIT_ENABLED")
                .map(|v| v != "0" && v != "false")
                .unwrap_or(true),
            max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            window: Duration::from_secs(
                env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        };

        Ok(Self {
            database_url,
            host,
            port,
            stage,
            auth,
            rate_limit,
        })
    }

    /// The local-diagnostics escape hatch is only honored outside production.
    pub fn auth_bypass_active(&self) -> bool {
        self.auth.bypass && self.stage != Stage::Production
    }
}
