pub mod config;
pub mod proxy;
pub mod ratelimit;
pub mod recurrence;
pub mod rest;

use std::sync::Arc;

use config::GatewayConfig;
use proxy::Forwarder;
use ratelimit::MemoryRateLimiter;

/// Shared application state passed to every HTTP handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<GatewayConfig>,
    /// Backend request relay. Stateless per call; the base URL is injected
    /// at construction so tests can point it at a local double.
    pub forwarder: Arc<Forwarder>,
    /// Outbound-notification throttle. Single-instance in-memory backing;
    /// not consulted on the proxy path.
    pub rate_limits: Arc<MemoryRateLimiter>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Arc<Self>> {
        let forwarder = Forwarder::new(&config.backend_url, config.request_timeout)?;
        Ok(Arc::new(Self {
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
            rate_limits: Arc::new(MemoryRateLimiter::new()),
            started_at: std::time::Instant::now(),
        }))
    }
}
