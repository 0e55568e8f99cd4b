use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Request as HttpRequest,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

// Once the map grows past this, stale windows are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Best-effort, process-local request counter per caller IP. Fixed window:
/// the count resets when the window elapses. Not shared across instances and
/// explicitly not part of the correctness contract.
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.windows.len() > SWEEP_THRESHOLD {
            self.sweep();
        }

        let now = Instant::now();
        let mut window = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;

        if window.count > self.config.max_requests {
            Err(AppError::RateLimited)
        } else {
            Ok(())
        }
    }

    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
    }

    pub fn tracked_ips(&self) -> usize {
        self.windows.len()
    }
}

/// Consulted before any handler; exceeding the threshold short-circuits with
/// 429 and never reaches the ledger or the verifier.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    if let Err(err) = state.limiter.check(ip) {
        tracing::warn!(ip = %ip, "rate limit exceeded");
        return err.into_response();
    }
    next.run(request).await
}

fn client_ip<B>(req: &HttpRequest<B>) -> IpAddr {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first) = forwarded_str.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            if let Ok(ip) = real_ip_str.parse::<IpAddr>() {
                return ip;
            }
        }
    }

    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip();
    }

    IpAddr::from([127, 0, 0, 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn config(max_requests: u32, window: Duration) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max_requests,
            window,
        }
    }

    #[test]
    fn allows_up_to_the_threshold() {
        let limiter = RateLimiter::new(config(3, Duration::from_secs(60)));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        for _ in 0..3 {
            assert!(limiter.check(ip).is_ok());
        }
        assert!(matches!(limiter.check(ip), Err(AppError::RateLimited)));
    }

    #[test]
    fn counts_are_per_ip() {
        let limiter = RateLimiter::new(config(1, Duration::from_secs(60)));
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_err());
        assert!(limiter.check(b).is_ok());
    }

    #[test]
    fn window_elapsing_resets_the_count() {
        let limiter = RateLimiter::new(config(1, Duration::from_millis(10)));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_err());
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check(ip).is_ok());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            max_requests: 1,
            window: Duration::from_secs(60),
        });
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4));
        for _ in 0..10 {
            assert!(limiter.check(ip).is_ok());
        }
    }

    #[test]
    fn sweep_drops_expired_windows() {
        let limiter = RateLimiter::new(config(5, Duration::from_millis(5)));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        limiter.check(ip).unwrap();
        assert_eq!(limiter.tracked_ips(), 1);
        std::thread::sleep(Duration::from_millis(10));
        limiter.sweep();
        assert_eq!(limiter.tracked_ips(), 0);
    }

    #[test]
    fn forwarded_header_takes_precedence() {
        let req = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.4")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.9".parse::<IpAddr>().unwrap());
    }
}
