use anyhow::Result;
use cli::Options;
use keepalive::{Config, KeepAliveService};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod util;

#[tokio::main]
async fn main() -> Result<()>
{
    setup_tracing();

    let options = Options::parse();
    debug!(?options);

    let mut cfg = Config::new()
        .ping_interval(options.interval.into())
        .ping_endpoint(&options.endpoint)
        .ping_message(&options.message)
        .host(options.host)
        .port(options.port)
        .timezone(&options.timezone)
        .enable_responder(!options.no_responder);
    if let Some(url) = &options.external_url {
        cfg = cfg.external_url(url);
    }

    let service = KeepAliveService::new(cfg)?;
    service.start().await?;

    let sig = util::signal::wait_for_shutdown().await?;
    info!("received signal: {}", sig);

    service.stop().await;

    Ok(())
}

fn setup_tracing()
{
    let default_filter_str =
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };
    let format = tracing_subscriber::fmt::format()
        .with_thread_ids(true);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter_str))
        .unwrap();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(filter)
        .init();
}
