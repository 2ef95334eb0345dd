use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cfg::PingAction;
use crate::stats::StatsRegister;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// One ping attempt: either the custom action or an HTTP GET against the
/// liveness endpoint. Outcomes are absorbed into the stats register and the
/// log; `ping()` never fails outward.
pub struct Pinger {
    client: reqwest::Client,
    target_url: String,
    action: Option<PingAction>,
    stats: Arc<StatsRegister>,
}

impl Pinger {
    pub fn new(external_url: &str, endpoint: &str, action: Option<PingAction>, stats: Arc<StatsRegister>) -> Result<Self>
    {
        let client = reqwest::Client::builder()
            .timeout(PING_TIMEOUT)
            .build()
            .context("building http client")?;

        let target_url = format!("{}/{}", external_url.trim_end_matches('/'), endpoint);

        Ok(Self { client, target_url, action, stats })
    }

    pub fn target_url(&self) -> &str
    {
        &self.target_url
    }

    pub async fn ping(&self) -> bool
    {
        let success = match &self.action {
            Some(action) => self.ping_action(action.clone()).await,
            None => self.ping_http().await,
        };
        self.stats.record(success).await;
        success
    }

    async fn ping_action(&self, action: PingAction) -> bool
    {
        match action().await {
            Ok(()) => true,
            Err(e) => {
                error!("custom pinger failed: {:#}", e);
                false
            }
        }
    }

    async fn ping_http(&self) -> bool
    {
        let started = Instant::now();
        let result = self.client.get(&self.target_url).send().await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                info!("ping successful in {:.2}s", elapsed.as_secs_f64());
                true
            }
            Ok(response) => {
                error!("ping failed with status code {}", response.status());
                false
            }
            Err(e) => {
                error!("ping failed: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_server(router: Router) -> SocketAddr
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn snapshot(stats: &StatsRegister) -> crate::stats::StatsSnapshot
    {
        stats.snapshot(Duration::from_secs(60), "UTC", "unused").await
    }

    #[tokio::test]
    async fn http_ping_records_success_on_200()
    {
        let addr = spawn_server(Router::new().route("/alive", get(|| async { "I am alive!" }))).await;
        let stats = Arc::new(StatsRegister::new());
        let pinger = Pinger::new(&format!("http://{}", addr), "alive", None, stats.clone()).unwrap();

        assert!(pinger.ping().await);

        let snap = snapshot(&stats).await;
        assert_eq!(snap.total_pings, 1);
        assert_eq!(snap.successful_pings, 1);
        assert_eq!(snap.failed_pings, 0);
    }

    #[tokio::test]
    async fn http_ping_records_failure_on_non_200()
    {
        let addr = spawn_server(Router::new().route("/alive", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))).await;
        let stats = Arc::new(StatsRegister::new());
        let pinger = Pinger::new(&format!("http://{}", addr), "alive", None, stats.clone()).unwrap();

        assert!(!pinger.ping().await);

        let snap = snapshot(&stats).await;
        assert_eq!(snap.total_pings, 1);
        assert_eq!(snap.successful_pings, 0);
        assert_eq!(snap.failed_pings, 1);
    }

    #[tokio::test]
    async fn http_ping_records_failure_on_transport_error()
    {
        // find a port with no listener behind it
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let stats = Arc::new(StatsRegister::new());
        let pinger = Pinger::new(&format!("http://{}", addr), "alive", None, stats.clone()).unwrap();

        assert!(!pinger.ping().await);

        let snap = snapshot(&stats).await;
        assert_eq!(snap.total_pings, 1);
        assert_eq!(snap.failed_pings, 1);
    }

    #[tokio::test]
    async fn custom_action_success_is_counted()
    {
        let stats = Arc::new(StatsRegister::new());
        let action: PingAction = Arc::new(|| Box::pin(async { Ok(()) }) as crate::cfg::PingFuture);
        let pinger = Pinger::new("http://unused", "alive", Some(action), stats.clone()).unwrap();

        assert!(pinger.ping().await);

        let snap = snapshot(&stats).await;
        assert_eq!(snap.successful_pings, 1);
        assert_eq!(snap.failed_pings, 0);
    }

    #[tokio::test]
    async fn custom_action_error_is_counted_as_failure()
    {
        let stats = Arc::new(StatsRegister::new());
        let action: PingAction = Arc::new(|| Box::pin(async { anyhow::bail!("boom") }) as crate::cfg::PingFuture);
        let pinger = Pinger::new("http://unused", "alive", Some(action), stats.clone()).unwrap();

        for _ in 0..3 {
            assert!(!pinger.ping().await);
        }

        let snap = snapshot(&stats).await;
        assert_eq!(snap.total_pings, 3);
        assert_eq!(snap.successful_pings, 0);
        assert_eq!(snap.failed_pings, 3);
    }

    #[test]
    fn target_url_joins_base_and_endpoint()
    {
        let stats = Arc::new(StatsRegister::new());
        let pinger = Pinger::new("https://x.example/", "health", None, stats).unwrap();
        assert_eq!(pinger.target_url(), "https://x.example/health");
    }
}
