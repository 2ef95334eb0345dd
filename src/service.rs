use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cfg::Config;
use crate::http::{self, Responder};
use crate::ping::Pinger;
use crate::sched::{SchedError, Scheduler};
use crate::stats::{StatsRegister, StatsSnapshot};

/// Hosting-platform environment variables consulted for the external URL,
/// in order; the first one present wins.
const PLATFORM_URL_VARS: [&str; 4] = [
    "RENDER_EXTERNAL_URL",
    "KOYEB_URL",
    "RAILWAY_STATIC_URL",
    "HEROKU_APP_URL",
];

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Scheduler(#[from] SchedError),
}

/// Keeps the hosting process alive: a tick loop pings the liveness endpoint
/// (or runs a custom action) on a fixed interval, and an HTTP responder
/// serves the endpoint plus a stats route.
///
/// Both background tasks are owned here, each with its own cancellation
/// token, so `stop()` has a deterministic join point.
pub struct KeepAliveService {
    cfg: Config,
    external_url: String,
    stats: Arc<StatsRegister>,
    pinger: Arc<Pinger>,
    state: Mutex<RunState>,
}

enum RunState {
    Idle,
    Running {
        scheduler: Scheduler,
        responder: Option<ResponderTask>,
    },
}

struct ResponderTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl ResponderTask {
    async fn stop(self)
    {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!("responder task failed: {}", e);
        }
    }
}

impl KeepAliveService {
    pub fn new(mut cfg: Config) -> Result<Self>
    {
        // normalized regardless of how the field was populated
        cfg.ping_endpoint = cfg.ping_endpoint.trim_matches('/').to_string();

        let external_url = match &cfg.external_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => detect_external_url(cfg.host, cfg.port),
        };

        let stats = Arc::new(StatsRegister::new());
        let pinger = Arc::new(Pinger::new(
            &external_url,
            &cfg.ping_endpoint,
            cfg.custom_pinger.clone(),
            stats.clone(),
        )?);

        info!(
            "keepalive service initialized with {} interval and endpoint /{}",
            humantime::Duration::from(cfg.ping_interval),
            cfg.ping_endpoint,
        );

        Ok(Self {
            cfg,
            external_url,
            stats,
            pinger,
            state: Mutex::new(RunState::Idle),
        })
    }

    /// Launches the responder (if enabled) and the tick loop. The first ping
    /// fires immediately. Calling `start()` on a running service is a no-op.
    pub async fn start(&self) -> Result<(), StartError>
    {
        let mut state = self.state.lock().await;
        if matches!(*state, RunState::Running { .. }) {
            warn!("keepalive service is already running");
            return Ok(());
        }

        self.stats.mark_started().await;

        let responder = if self.cfg.enable_responder {
            self.spawn_responder().await
        } else {
            None
        };

        let pinger = self.pinger.clone();
        let on_tick = move || {
            let pinger = pinger.clone();
            async move {
                pinger.ping().await;
            }
        };

        let scheduler = match Scheduler::start(self.cfg.ping_interval, &self.cfg.scheduler, on_tick) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                // starting failed; do not leave the responder behind
                if let Some(responder) = responder {
                    responder.stop().await;
                }
                return Err(e.into());
            }
        };

        *state = RunState::Running { scheduler, responder };
        info!("keepalive service started");
        Ok(())
    }

    /// Stops the tick loop and the responder. Returns only after both tasks
    /// have quiesced; no ping is recorded afterwards. Calling `stop()` on an
    /// idle service is a no-op.
    pub async fn stop(&self)
    {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, RunState::Idle) {
            RunState::Idle => {
                warn!("keepalive service is not running");
            }
            RunState::Running { scheduler, responder } => {
                scheduler.stop().await;
                if let Some(responder) = responder {
                    responder.stop().await;
                }
                info!("keepalive service stopped");
            }
        }
    }

    /// Snapshot of the counters plus uptime since the last `start()`.
    /// Safe to call concurrently with ongoing pings.
    pub async fn get_stats(&self) -> StatsSnapshot
    {
        self.stats
            .snapshot(self.cfg.ping_interval, &self.cfg.timezone, &self.external_url)
            .await
    }

    pub async fn is_running(&self) -> bool
    {
        matches!(*self.state.lock().await, RunState::Running { .. })
    }

    /// The base URL the pinger targets, as configured or auto-detected.
    pub fn external_url(&self) -> &str
    {
        &self.external_url
    }

    /// Binds the responder and spawns its accept loop. A bind failure is
    /// logged and yields `None`: the service runs degraded, scheduler only.
    async fn spawn_responder(&self) -> Option<ResponderTask>
    {
        let listen_addr = SocketAddr::new(self.cfg.host, self.cfg.port);
        let listener = match tokio::net::TcpListener::bind(listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("binding http responder to {} failed: {}", listen_addr, e);
                return None;
            }
        };
        debug!("listening on {}", listen_addr);

        let responder = Responder {
            endpoint: self.cfg.ping_endpoint.clone(),
            message: self.cfg.ping_message.clone(),
            ping_interval: self.cfg.ping_interval,
            timezone: self.cfg.timezone.clone(),
            external_url: self.external_url.clone(),
            stats: self.stats.clone(),
        };

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = http::serve(listener, responder, token).await {
                error!("http responder failed: {:#}", e);
            }
        });

        Some(ResponderTask { shutdown, handle })
    }
}

/// Builds a service from the given configuration and starts it.
pub async fn create_service(cfg: Config) -> Result<Arc<KeepAliveService>>
{
    let service = Arc::new(KeepAliveService::new(cfg)?);
    service.start().await?;
    Ok(service)
}

/// One-shot best-effort detection of the publicly reachable base URL,
/// performed at construction time and never re-evaluated.
fn detect_external_url(host: IpAddr, port: u16) -> String
{
    for var in PLATFORM_URL_VARS {
        if let Ok(url) = std::env::var(var) {
            info!("using {} for external url: {}", var, url);
            return url;
        }
    }

    match local_ip() {
        Ok(ip) => format!("http://{}:{}", ip, port),
        Err(e) => {
            warn!("could not determine local ip: {:#}", e);
            format!("http://{}:{}", host, port)
        }
    }
}

// Learns the machine's outbound address without sending any packets:
// connecting a UDP socket only selects the route.
fn local_ip() -> Result<IpAddr>
{
    let socket = std::net::UdpSocket::bind(("0.0.0.0", 0)).context("binding probe socket")?;
    socket.connect(("8.8.8.8", 53)).context("selecting outbound interface")?;
    let addr = socket.local_addr().context("reading local address")?;
    Ok(addr.ip())
}
