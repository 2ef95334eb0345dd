use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Shared ping counters. A single mutex guards the counters and the start
/// time together, so readers never observe a half-applied update.
#[derive(Debug)]
pub struct StatsRegister {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    total_pings: u64,
    successful_pings: u64,
    failed_pings: u64,
    started_at: DateTime<Utc>,
}

impl StatsRegister {
    pub fn new() -> Self
    {
        let inner = Inner {
            total_pings: 0,
            successful_pings: 0,
            failed_pings: 0,
            started_at: Utc::now(),
        };
        Self { inner: Mutex::new(inner) }
    }

    /// Records one ping attempt: the total and exactly one of the outcome
    /// counters move under the same lock acquisition.
    pub async fn record(&self, success: bool)
    {
        let mut inner = self.inner.lock().await;
        inner.total_pings += 1;
        if success {
            inner.successful_pings += 1;
        } else {
            inner.failed_pings += 1;
        }
    }

    /// Resets the start time. Cumulative counters are left untouched; they
    /// span the lifetime of the instance, not a single run.
    pub async fn mark_started(&self)
    {
        self.inner.lock().await.started_at = Utc::now();
    }

    pub async fn snapshot(&self, ping_interval: Duration, timezone: &str, external_url: &str) -> StatsSnapshot
    {
        let inner = self.inner.lock().await;
        let uptime = Utc::now() - inner.started_at;
        let uptime_seconds = (uptime.num_milliseconds().max(0) as f64) / 1000.0;

        StatsSnapshot {
            uptime: format_uptime(uptime_seconds as u64),
            uptime_seconds,
            ping_interval: ping_interval.as_secs(),
            total_pings: inner.total_pings,
            successful_pings: inner.successful_pings,
            failed_pings: inner.failed_pings,
            success_rate: (inner.successful_pings as f64 / inner.total_pings.max(1) as f64) * 100.0,
            started_at: format_started_at(inner.started_at, timezone),
            external_url: external_url.to_string(),
        }
    }
}

/// Point-in-time view of the service statistics, as returned by
/// `get_stats()` and the stats route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub uptime: String,
    pub uptime_seconds: f64,
    pub ping_interval: u64,
    pub total_pings: u64,
    pub successful_pings: u64,
    pub failed_pings: u64,
    pub success_rate: f64,
    pub started_at: String,
    pub external_url: String,
}

fn format_uptime(total_seconds: u64) -> String
{
    let (days, rem) = (total_seconds / 86400, total_seconds % 86400);
    let (hours, rem) = (rem / 3600, rem % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}

fn format_started_at(started_at: DateTime<Utc>, timezone: &str) -> String
{
    // the corpus carries no tz database; anything other than UTC renders
    // in the system-local timezone
    if timezone.eq_ignore_ascii_case("utc") {
        started_at.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting()
    {
        assert_eq!(format_uptime(0), "0d 0h 0m 0s");
        assert_eq!(format_uptime(59), "0d 0h 0m 59s");
        assert_eq!(format_uptime(3601), "0d 1h 0m 1s");
        assert_eq!(format_uptime(86400 + 2 * 3600 + 3 * 60 + 4), "1d 2h 3m 4s");
    }

    #[test]
    fn started_at_formatting()
    {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:34:56Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_started_at(ts, "UTC"), "2024-05-01 12:34:56");
        // local rendering keeps the same shape regardless of offset
        assert_eq!(format_started_at(ts, "America/New_York").len(), 19);
    }

    #[tokio::test]
    async fn success_rate_is_zero_without_pings()
    {
        let stats = StatsRegister::new();
        let snap = stats.snapshot(Duration::from_secs(60), "UTC", "http://localhost:10000").await;
        assert_eq!(snap.total_pings, 0);
        assert_eq!(snap.success_rate, 0.0);
    }

    #[tokio::test]
    async fn outcomes_are_accounted()
    {
        let stats = StatsRegister::new();
        for success in [true, true, false, true, false] {
            stats.record(success).await;
        }
        let snap = stats.snapshot(Duration::from_secs(60), "UTC", "x").await;
        assert_eq!(snap.total_pings, 5);
        assert_eq!(snap.successful_pings, 3);
        assert_eq!(snap.failed_pings, 2);
        assert_eq!(snap.successful_pings + snap.failed_pings, snap.total_pings);
        assert_eq!(snap.success_rate, 60.0);
    }

    #[tokio::test]
    async fn success_rate_two_thirds()
    {
        let stats = StatsRegister::new();
        stats.record(true).await;
        stats.record(true).await;
        stats.record(false).await;
        let snap = stats.snapshot(Duration::from_secs(60), "UTC", "x").await;
        assert!((snap.success_rate - 66.67).abs() < 0.01);
    }

    #[tokio::test]
    async fn mark_started_keeps_counters()
    {
        let stats = StatsRegister::new();
        stats.record(true).await;
        stats.mark_started().await;
        let snap = stats.snapshot(Duration::from_secs(60), "UTC", "x").await;
        assert_eq!(snap.total_pings, 1);
        assert!(snap.uptime_seconds < 1.0);
    }

    #[tokio::test]
    async fn snapshot_serializes_expected_fields()
    {
        let stats = StatsRegister::new();
        stats.record(true).await;
        let snap = stats.snapshot(Duration::from_secs(30), "UTC", "https://x.example").await;
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["ping_interval"], 30);
        assert_eq!(json["total_pings"], 1);
        assert_eq!(json["external_url"], "https://x.example");
        assert_eq!(json["started_at"].as_str().unwrap().len(), 19);
        assert!(json["uptime"].as_str().unwrap().ends_with('s'));
    }
}
