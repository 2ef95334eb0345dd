//! Keeps an application alive on hosting platforms that reclaim idle
//! services: a background tick loop pings a liveness endpoint (or runs a
//! user-supplied action) on a fixed interval, while an HTTP responder
//! serves the endpoint and a stats route.

pub use cfg::{Config, PingAction, PingFuture, SchedulerOptions};
pub use sched::SchedError;
pub use service::{create_service, KeepAliveService, StartError};
pub use stats::StatsSnapshot;

mod cfg;
mod http;
mod ping;
mod sched;
mod service;
mod stats;
