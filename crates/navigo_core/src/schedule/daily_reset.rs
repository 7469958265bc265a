//! Daily wall-clock reset scheduler.
//!
//! # Responsibility
//! - Compute the delay until the next local reset time (02:00 by default).
//! - Fire a callback at that time and re-arm for the following day.
//!
//! # Invariants
//! - At most one pending timer exists per scheduler.
//! - The next target is recomputed from the clock after every firing, so
//!   clock changes and suspend/resume never accumulate drift.
//! - A firing happens only once the wall clock has reached the target.
//! - The target is strictly after "now": at exactly the reset time the
//!   next firing is tomorrow's.
//! - `stop()` is idempotent and safe when nothing is scheduled.

use chrono::{DateTime, Days, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Step used to walk past a local-time gap (DST spring-forward).
const GAP_PROBE_STEP_MINUTES: u64 = 15;
/// Longest gap we probe across before giving up.
const GAP_PROBE_LIMIT: u64 = 24 * 60 / GAP_PROBE_STEP_MINUTES;
const TIMER_THREAD_NAME: &str = "navigo-daily-reset";
/// Upper bound on one wait, so wall-clock jumps are noticed.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(60);

/// Returns the default reset time of day, 02:00:00.000.
pub fn default_reset_time() -> NaiveTime {
    NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default()
}

/// Scheduler errors.
#[derive(Debug)]
pub enum ScheduleError {
    /// No valid local instant found for the reset time.
    UnresolvableLocalTime(NaiveDateTime),
    /// Timer thread could not be started.
    Spawn(std::io::Error),
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvableLocalTime(value) => {
                write!(f, "unable to resolve local reset time `{value}`")
            }
            Self::Spawn(err) => write!(f, "failed to start reset timer: {err}"),
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnresolvableLocalTime(_) => None,
            Self::Spawn(err) => Some(err),
        }
    }
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// System local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Returns the first occurrence of `at` strictly after `now`.
///
/// Ambiguous local times resolve to the earliest instant; a time inside a
/// gap resolves to the first valid instant after the gap.
pub fn next_reset_after<Tz: TimeZone>(
    now: &DateTime<Tz>,
    at: NaiveTime,
) -> Result<DateTime<Tz>, ScheduleError> {
    let tz = now.timezone();
    let today = now.date_naive();

    let target = resolve_local(&tz, today.and_time(at))?;
    if target > *now {
        return Ok(target);
    }

    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or(ScheduleError::UnresolvableLocalTime(today.and_time(at)))?;
    resolve_local(&tz, tomorrow.and_time(at))
}

/// Returns how long to wait from `now` until the next `at`.
pub fn delay_until_next_reset<Tz: TimeZone>(
    now: &DateTime<Tz>,
    at: NaiveTime,
) -> Result<Duration, ScheduleError> {
    let target = next_reset_after(now, at)?;
    Ok(remaining(now, &target))
}

/// Time left until `target`; zero once it has passed.
fn remaining<Tz: TimeZone>(now: &DateTime<Tz>, target: &DateTime<Tz>) -> Duration {
    target
        .clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    candidate: NaiveDateTime,
) -> Result<DateTime<Tz>, ScheduleError> {
    let mut probe = candidate;
    for _ in 0..=GAP_PROBE_LIMIT {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(value) => return Ok(value),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => {
                probe += chrono::Duration::minutes(GAP_PROBE_STEP_MINUTES as i64);
            }
        }
    }
    Err(ScheduleError::UnresolvableLocalTime(candidate))
}

struct PendingTimer {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

/// Fires a callback every day at a fixed local time until stopped.
pub struct DailyResetScheduler {
    reset_at: NaiveTime,
    clock: Arc<dyn Clock>,
    pending: Option<PendingTimer>,
}

impl DailyResetScheduler {
    /// Scheduler for 02:00 local time on the system clock.
    pub fn new() -> Self {
        Self::with_clock(default_reset_time(), Arc::new(SystemClock))
    }

    pub fn with_reset_time(reset_at: NaiveTime) -> Self {
        Self::with_clock(reset_at, Arc::new(SystemClock))
    }

    pub fn with_clock(reset_at: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self {
            reset_at,
            clock,
            pending: None,
        }
    }

    pub fn reset_at(&self) -> NaiveTime {
        self.reset_at
    }

    /// Returns `true` while the timer thread is alive.
    ///
    /// A callback panic ends the thread, so this turns `false` without `stop()`.
    pub fn is_running(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Delay from the clock's "now" to the next firing.
    pub fn next_delay(&self) -> Result<Duration, ScheduleError> {
        delay_until_next_reset(&self.clock.now(), self.reset_at)
    }

    /// Arms the timer; `on_fire` runs at every reset time until `stop()`.
    ///
    /// Starting a running scheduler replaces its pending timer.
    ///
    /// # Errors
    /// - `UnresolvableLocalTime` when the first target cannot be computed.
    /// - `Spawn` when the timer thread cannot be created.
    pub fn start<F>(&mut self, mut on_fire: F) -> Result<(), ScheduleError>
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        let now = self.clock.now();
        let first_target = next_reset_after(&now, self.reset_at)?;
        let first_delay = remaining(&now, &first_target);
        let (cancel, cancelled) = mpsc::channel::<()>();
        let clock = Arc::clone(&self.clock);
        let reset_at = self.reset_at;

        let handle = std::thread::Builder::new()
            .name(TIMER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut target = first_target;
                loop {
                    let wait = remaining(&clock.now(), &target).min(MAX_WAIT_SLICE);
                    match cancelled.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                    // the wait runs on the monotonic clock; only fire once wall time agrees
                    if clock.now() < target {
                        continue;
                    }

                    info!("event=daily_reset module=schedule status=fire");
                    on_fire();

                    let now = clock.now();
                    target = match next_reset_after(&now, reset_at) {
                        Ok(next) => next,
                        Err(err) => {
                            error!("event=daily_reset module=schedule status=error error={err}");
                            return;
                        }
                    };
                    info!(
                        "event=daily_reset module=schedule status=rearm delay_ms={}",
                        remaining(&now, &target).as_millis()
                    );
                }
            })
            .map_err(ScheduleError::Spawn)?;

        info!(
            "event=daily_reset module=schedule status=start reset_at={} delay_ms={}",
            reset_at.format("%H:%M"),
            first_delay.as_millis()
        );
        self.pending = Some(PendingTimer { cancel, handle });
        Ok(())
    }

    /// Cancels the pending timer, if any, and waits for it to exit.
    pub fn stop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        // send fails only if the thread already exited
        let _ = pending.cancel.send(());
        if pending.handle.join().is_err() {
            error!("event=daily_reset module=schedule status=error reason=callback_panicked");
        }
        info!("event=daily_reset module=schedule status=stop");
    }
}

impl Default for DailyResetScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DailyResetScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
