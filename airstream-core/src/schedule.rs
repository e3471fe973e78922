use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ScheduleSection;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("current time {now} is beyond the streaming end date {end}")]
    WindowElapsed { now: NaiveDateTime, end: NaiveDate },
    #[error("wait for streaming start was cancelled")]
    Cancelled,
}

/// Streaming window. Both boundaries are midnight at the start of the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<&ScheduleSection> for ScheduleWindow {
    fn from(section: &ScheduleSection) -> Self {
        Self {
            start: section.start_date,
            end: section.end_date,
        }
    }
}

impl ScheduleWindow {
    pub fn delay_until_start(&self, now: NaiveDateTime) -> Result<Duration, ScheduleError> {
        let end = self.end.and_hms_opt(0, 0, 0).unwrap_or_default();
        if now > end {
            return Err(ScheduleError::WindowElapsed {
                now,
                end: self.end,
            });
        }
        let start = self.start.and_hms_opt(0, 0, 0).unwrap_or_default();
        Ok((start - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Sleeps until the window opens, measured against local time.
    pub async fn wait_for_start(&self, cancel: &CancellationToken) -> Result<(), ScheduleError> {
        let delay = self.delay_until_start(chrono::Local::now().naive_local())?;
        if !delay.is_zero() {
            info!(start = %self.start, wait_seconds = delay.as_secs(), "waiting for streaming window");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(ScheduleError::Cancelled),
            }
        }
        info!(end = %self.end, "start streaming, files beyond the end date are not scheduled");
        Ok(())
    }
}
