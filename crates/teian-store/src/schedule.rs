//! Daily upload-quota reset.
//!
//! [`DailyAt`] is a wall-clock time of day. [`QuotaResetDriver`] sleeps until
//! the next occurrence of it in local time, clears every user's quota, and
//! goes back to sleep until the same time the following day.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::UploadQuota;

/// A time of day, second precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyAt {
    time: NaiveTime,
}

impl DailyAt {
    pub fn new(hour: u32, minute: u32, second: u32) -> StoreResult<Self> {
        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self::from_time)
            .ok_or_else(|| {
                StoreError::InvalidSchedule(format!("{hour:02}:{minute:02}:{second:02}"))
            })
    }

    /// Sub-second precision is dropped.
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            time: time.with_nanosecond(0).unwrap_or(time),
        }
    }

    /// First occurrence of this time of day at or after `now`, in `now`'s
    /// time zone.
    ///
    /// A time that falls in a DST gap is pushed forward by whole hours until
    /// it exists. A time that occurs twice fires at the earlier one.
    pub fn next_fire<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.date_naive();
        let candidate = self.resolve(&tz, today);
        if candidate >= *now {
            return candidate;
        }
        // NaiveDate::MAX has no successor.
        let tomorrow = today.succ_opt().unwrap_or(today);
        self.resolve(&tz, tomorrow)
    }

    fn resolve<Tz: TimeZone>(&self, tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
        let mut local = date.and_time(self.time);
        // Real-world gaps are at most a couple of hours.
        for _ in 0..4 {
            match tz.from_local_datetime(&local) {
                LocalResult::Single(t) => return t,
                LocalResult::Ambiguous(earliest, _) => return earliest,
                LocalResult::None => local += chrono::Duration::hours(1),
            }
        }
        tz.from_utc_datetime(&date.and_time(self.time))
    }
}

impl Default for DailyAt {
    /// 04:00:00.
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for DailyAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%H:%M:%S"))
    }
}

impl FromStr for DailyAt {
    type Err = StoreError;

    /// `HH:MM:SS` or `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Self::from_time)
            .map_err(|e| StoreError::InvalidSchedule(format!("{s:?}: {e}")))
    }
}

/// Wall clock used to compute fire times.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Background task that clears all upload quotas once a day.
pub struct QuotaResetDriver {
    quota: Arc<dyn UploadQuota>,
    at: DailyAt,
    now: Clock,
}

impl QuotaResetDriver {
    pub fn new(quota: Arc<dyn UploadQuota>, at: DailyAt) -> Self {
        Self::with_clock(quota, at, Arc::new(Local::now))
    }

    pub fn with_clock(quota: Arc<dyn UploadQuota>, at: DailyAt, now: Clock) -> Self {
        Self { quota, at, now }
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// A reset already in progress is allowed to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let mut from = (self.now)();
        loop {
            let target = self.at.next_fire(&from);
            let wait = target
                .signed_duration_since((self.now)())
                .to_std()
                .unwrap_or(Duration::ZERO);
            info!(next = %target, wait_secs = wait.as_secs(), "quota reset scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("quota reset driver stopped");
                        return;
                    }
                    continue;
                }
            }

            self.fire().await;
            // Never schedule the same instant twice, even if the clock lags.
            from = std::cmp::max((self.now)(), target + chrono::Duration::seconds(1));
        }
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn fire(&self) {
        let quota = Arc::clone(&self.quota);
        match tokio::task::spawn_blocking(move || quota.reset_all()).await {
            Ok(Ok(cleared)) => info!(cleared, "daily quota reset complete"),
            Ok(Err(e)) => error!(error = %e, "daily quota reset failed"),
            Err(e) => error!(error = %e, "daily quota reset task died"),
        }
    }
}

impl fmt::Debug for QuotaResetDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaResetDriver")
            .field("at", &self.at)
            .finish_non_exhaustive()
    }
}
