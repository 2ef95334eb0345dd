use std::net::IpAddr;

use clap::Parser;
use humantime::Duration;

/// Keep an application alive by pinging it on a fixed interval.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Options {
    /// Time between pings.
    #[arg(long, default_value = "60s")]
    pub interval: Duration,

    /// Path of the liveness endpoint.
    #[arg(long, default_value = "alive")]
    pub endpoint: String,

    /// Body returned by the liveness endpoint.
    #[arg(long, default_value = "I am alive!")]
    pub message: String,

    /// Host for the HTTP responder to bind on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port for the HTTP responder to bind on.
    #[arg(long, default_value_t = 10000)]
    pub port: u16,

    /// Timezone used when rendering timestamps: "UTC", or anything else for
    /// the system-local timezone.
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Publicly reachable base URL to ping. Auto-detected when omitted.
    #[arg(long, env = "KEEPALIVE_EXTERNAL_URL")]
    pub external_url: Option<String>,

    /// Run the tick loop only, without the HTTP responder.
    #[arg(long)]
    pub no_responder: bool,
}

impl Options {
    /// Parse CLI options. Panic on failure.
    pub fn parse() -> Self
    {
        <Self as Parser>::parse()
    }
}
