//! Daily trigger for the digest pipeline.

use crate::pipeline::{DigestPipeline, Trigger};
use crate::traits::DeliveryChannel;
use crate::types::{DigestError, Result};
use crate::utils::time::format_duration;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

/// Parses `UTC`, `Z`, `+06:00`, `-0330`, `+6` or `UTC+6` into a fixed offset.
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    if rest.is_empty() || rest == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid_offset(raw));
    }

    let (sign, digits) = if let Some(d) = rest.strip_prefix('+') {
        (1, d)
    } else if let Some(d) = rest.strip_prefix('-') {
        (-1, d)
    } else {
        return Err(invalid_offset(raw));
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid_offset(raw))?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid_offset(raw))?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid_offset(raw));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid_offset(raw))
}

fn invalid_offset(raw: &str) -> DigestError {
    DigestError::Config(format!(
        "invalid timezone '{raw}': expected UTC or a fixed offset such as +06:00"
    ))
}

/// A time of day in a fixed-offset timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }

    /// Parses `HH:MM` and a timezone accepted by [`parse_offset`].
    pub fn parse(time: &str, timezone: &str) -> Result<Self> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| {
            DigestError::Config(format!("invalid schedule '{time}': expected HH:MM"))
        })?;
        Ok(Self::new(parsed, parse_offset(timezone)?))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// The first trigger strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        let mut date = local.date_naive();
        loop {
            let candidate = self
                .offset
                .from_local_datetime(&date.and_time(self.time))
                .single()
                .map(|dt| dt.with_timezone(&Utc));
            if let Some(candidate) = candidate.filter(|c| *c > now) {
                return candidate;
            }
            date = date + Duration::days(1);
        }
    }
}

/// Runs the pipeline and delivers once per day until shut down.
pub struct DigestScheduler {
    schedule: DailySchedule,
    pipeline: Arc<DigestPipeline>,
    channel: Arc<dyn DeliveryChannel>,
    shutdown: Arc<Notify>,
}

impl DigestScheduler {
    pub fn new(
        schedule: DailySchedule,
        pipeline: Arc<DigestPipeline>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            schedule,
            pipeline,
            channel,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Start the scheduler loop. Returns on shutdown signal.
    ///
    /// A failed run is logged and the loop waits for the next trigger.
    pub async fn run(&self) {
        loop {
            let now = Utc::now();
            let next = self.schedule.next_after(now);
            let wait = next - now;
            info!(next_run = %next, "Next digest in {}", format_duration(wait));

            tokio::select! {
                _ = tokio::time::sleep(wait.to_std().unwrap_or_default()) => {
                    match self.pipeline.run_and_deliver(Trigger::Scheduled, self.channel.as_ref()).await {
                        Ok(report) => info!(run_id = %report.run_id, "Scheduled digest run finished"),
                        Err(e) => error!(error = %e, "Scheduled digest run failed"),
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Signal the scheduler to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
