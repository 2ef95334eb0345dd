use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio_stream::wrappers::SignalStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::error;

/// Waits until a terminating signal arrives and returns its name.
pub async fn wait_for_shutdown() -> Result<&'static str>
{
    let mut signals = StreamMap::new();
    for (name, kind) in [
        ("SIGINT", SignalKind::interrupt()),
        ("SIGTERM", SignalKind::terminate()),
    ] {
        let sig = signal(kind).with_context(|| format!("unable to install signal handler for {}", name))?;
        signals.insert(name, SignalStream::new(sig));
    }

    match signals.next().await {
        Some((name, ())) => Ok(name),
        None => {
            error!("all signal streams are closed. This should never happen.");
            anyhow::bail!("signal streams closed");
        }
    }
}
