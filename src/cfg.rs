use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

/// Future returned by a custom ping action.
pub type PingFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// User-supplied replacement for the HTTP self-ping.
/// Completing without error counts as a successful ping.
pub type PingAction = Arc<dyn Fn() -> PingFuture + Send + Sync>;

pub struct Config {
    /// Time between pings. Must be greater than zero.
    pub ping_interval: Duration,
    /// Path of the liveness endpoint, without leading or trailing slashes.
    pub ping_endpoint: String,
    /// Body returned when the liveness endpoint is hit.
    pub ping_message: String,
    /// Host for the HTTP responder to bind on.
    pub host: IpAddr,
    /// Port for the HTTP responder to bind on.
    pub port: u16,
    /// Timezone used when rendering `started_at`: "UTC", or anything else
    /// for the system-local timezone.
    pub timezone: String,
    /// Publicly reachable base URL to ping. Auto-detected when `None`.
    pub external_url: Option<String>,
    /// Custom action to run instead of the HTTP self-ping.
    pub custom_pinger: Option<PingAction>,
    /// Whether to run the HTTP responder at all.
    pub enable_responder: bool,
    pub scheduler: SchedulerOptions,
}

impl Config {
    pub fn new() -> Self
    {
        Self {
            ping_interval: Duration::from_secs(60),
            ping_endpoint: "alive".to_string(),
            ping_message: "I am alive!".to_string(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 10000,
            timezone: "UTC".to_string(),
            external_url: None,
            custom_pinger: None,
            enable_responder: true,
            scheduler: SchedulerOptions::default(),
        }
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self
    {
        self.ping_interval = interval;
        self
    }

    pub fn ping_endpoint(mut self, endpoint: &str) -> Self
    {
        self.ping_endpoint = endpoint.trim_matches('/').to_string();
        self
    }

    pub fn ping_message(mut self, message: &str) -> Self
    {
        self.ping_message = message.to_string();
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self
    {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self
    {
        self.port = port;
        self
    }

    pub fn timezone(mut self, timezone: &str) -> Self
    {
        self.timezone = timezone.to_string();
        self
    }

    pub fn external_url(mut self, url: &str) -> Self
    {
        self.external_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn custom_pinger<F, Fut>(mut self, action: F) -> Self
        where F: Fn() -> Fut + Send + Sync + 'static,
              Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.custom_pinger = Some(Arc::new(move || Box::pin(action()) as PingFuture));
        self
    }

    pub fn enable_responder(mut self, enabled: bool) -> Self
    {
        self.enable_responder = enabled;
        self
    }

    pub fn scheduler(mut self, options: SchedulerOptions) -> Self
    {
        self.scheduler = options;
        self
    }
}

impl Default for Config {
    fn default() -> Self
    {
        Self::new()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Config")
            .field("ping_interval", &self.ping_interval)
            .field("ping_endpoint", &self.ping_endpoint)
            .field("ping_message", &self.ping_message)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timezone", &self.timezone)
            .field("external_url", &self.external_url)
            .field("custom_pinger", &self.custom_pinger.is_some())
            .field("enable_responder", &self.enable_responder)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Tuning for the tick loop.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Merge overdue ticks into one instead of firing them back to back.
    pub coalesce: bool,
    /// Upper bound on concurrently running ticks. The tokio backend runs
    /// ticks inline and supports exactly 1; zero is rejected at start.
    pub max_instances: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self
    {
        Self { coalesce: true, max_instances: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_normalized()
    {
        let cfg = Config::new().ping_endpoint("/health/");
        assert_eq!(cfg.ping_endpoint, "health");
    }

    #[test]
    fn external_url_trailing_slash_is_stripped()
    {
        let cfg = Config::new().external_url("https://x.example/");
        assert_eq!(cfg.external_url.as_deref(), Some("https://x.example"));
    }

    #[test]
    fn defaults_match_documented_values()
    {
        let cfg = Config::new();
        assert_eq!(cfg.ping_interval, Duration::from_secs(60));
        assert_eq!(cfg.ping_endpoint, "alive");
        assert_eq!(cfg.ping_message, "I am alive!");
        assert_eq!(cfg.port, 10000);
        assert_eq!(cfg.timezone, "UTC");
        assert!(cfg.enable_responder);
        assert!(cfg.scheduler.coalesce);
        assert_eq!(cfg.scheduler.max_instances, 1);
    }
}
