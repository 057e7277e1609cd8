//! Timed checkpoint replay
//!
//! [`CheckpointPlayer`] re-applies the records of a checkpoint file to a
//! context on a background thread, spacing them out by the differences in
//! their time-of-interest. The first record is applied immediately and
//! anchors the schedule; each later record is released at
//! `previous_release + (toi - previous_toi)`. A record whose release time has
//! already passed is applied without waiting.
//!
//! Playback ends when the file is exhausted, a read fails, or
//! [`CheckpointPlayer::stop`] is called. Stopping interrupts any wait.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use madara_storage::{KnowledgeUpdateSettings, ThreadSafeContext};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, Span};

use crate::error::{CheckpointError, Result};
use crate::reader::CheckpointReader;
use crate::settings::CheckpointSettings;

/// Cooperative cancellation flag with an interruptible wait
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any waiter
    pub fn stop(&self) {
        let (flag, cond) = &*self.inner;
        *flag.lock() = true;
        cond.notify_all();
    }

    /// True once a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` unless stopped first
    ///
    /// Returns true if a stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let mut stopped = flag.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while !*stopped {
                    if cond.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
            }
            // Past the end of the clock: only a stop ends the wait
            None => {
                while !*stopped {
                    cond.wait(&mut stopped);
                }
            }
        }
        *stopped
    }
}

/// External simulated clock
pub trait SimTimeSource: Send + Sync {
    /// Told the time-of-interest (nanoseconds) of the first record played
    fn start(&self, first_toi: u64);

    /// Simulated seconds that pass per real second
    fn rate(&self) -> f64;
}

/// How waits between records map onto real time
#[derive(Clone, Default)]
pub enum PlaybackClock {
    /// Wait the toi difference on the wall clock
    #[default]
    Realtime,
    /// Scale waits by the simulated clock's rate
    Simulated(Arc<dyn SimTimeSource>),
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackClock::Realtime => f.write_str("Realtime"),
            PlaybackClock::Simulated(source) => {
                f.debug_tuple("Simulated").field(&source.rate()).finish()
            }
        }
    }
}

impl PlaybackClock {
    fn first_record(&self, toi: u64) {
        if let PlaybackClock::Simulated(source) = self {
            source.start(toi);
        }
    }

    fn real_wait(&self, toi_delta: u64) -> Duration {
        let delta = Duration::from_nanos(toi_delta);
        match self {
            PlaybackClock::Realtime => delta,
            PlaybackClock::Simulated(source) => {
                let rate = source.rate();
                if rate > 0.0 && rate.is_finite() {
                    Duration::try_from_secs_f64(delta.as_secs_f64() / rate)
                        .unwrap_or(Duration::MAX)
                } else {
                    Duration::ZERO
                }
            }
        }
    }
}

/// Replays a checkpoint into a context at its recorded cadence
pub struct CheckpointPlayer {
    context: Arc<ThreadSafeContext>,
    settings: CheckpointSettings,
    update_settings: KnowledgeUpdateSettings,
    clock: PlaybackClock,
    span: Span,
    stop: StopToken,
    handle: Option<JoinHandle<Result<u64>>>,
    reader: Option<CheckpointReader>,
}

impl CheckpointPlayer {
    /// Create a player for `settings.filename`
    pub fn new(
        context: Arc<ThreadSafeContext>,
        settings: CheckpointSettings,
        update_settings: KnowledgeUpdateSettings,
    ) -> Self {
        CheckpointPlayer {
            context,
            settings,
            update_settings,
            clock: PlaybackClock::Realtime,
            span: Span::current(),
            stop: StopToken::new(),
            handle: None,
            reader: None,
        }
    }

    /// Use a different playback clock
    pub fn with_clock(mut self, clock: PlaybackClock) -> Self {
        self.clock = clock;
        self
    }

    /// Log under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// True while the playback thread is running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Start playback on a background thread
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(CheckpointError::InvalidOperation(
                "checkpoint player already started".into(),
            ));
        }

        self.stop = StopToken::new();
        let context = Arc::clone(&self.context);
        let reader = CheckpointReader::new(self.settings.clone()).with_span(self.span.clone());
        let update_settings = self.update_settings.clone();
        let clock = self.clock.clone();
        let stop = self.stop.clone();
        let span = self.span.clone();

        let handle = thread::Builder::new()
            .name("madara-player".into())
            .spawn(move || {
                let _enter = span.enter();
                let result = playback_loop(&context, reader, &update_settings, &clock, &stop);
                if let Err(e) = &result {
                    error!(target: "madara::player", error = %e, "Playback failed");
                }
                result
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Request a stop, join the thread and return the records applied
    ///
    /// A read error hit during playback is returned here. Stopping a player
    /// that was never started returns `Ok(0)`.
    pub fn stop(&mut self) -> Result<u64> {
        self.stop.stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                CheckpointError::InvalidOperation("checkpoint player thread panicked".into())
            })?,
            None => Ok(0),
        }
    }

    /// Wait for playback to finish on its own
    pub fn join(&mut self) -> Result<u64> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                CheckpointError::InvalidOperation("checkpoint player thread panicked".into())
            })?,
            None => Ok(0),
        }
    }

    /// Apply records synchronously, without waiting, until one with
    /// `toi >= target` has been applied
    ///
    /// Repeated calls continue where the previous one stopped. Returns the
    /// number of records applied by this call.
    pub fn play_until(&mut self, target: u64) -> Result<u64> {
        if self.handle.is_some() {
            return Err(CheckpointError::InvalidOperation(
                "play_until while background playback is running".into(),
            ));
        }

        let settings = &self.settings;
        let span = &self.span;
        let reader = self
            .reader
            .get_or_insert_with(|| CheckpointReader::new(settings.clone()).with_span(span.clone()));

        let _guard = self.context.lock();
        let mut applied = 0u64;
        while let Some((key, record)) = reader.next()? {
            self.context
                .update_record_from_external(&key, &record, &self.update_settings);
            applied += 1;
            if record.toi >= target {
                break;
            }
        }
        Ok(applied)
    }
}

impl Drop for CheckpointPlayer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}

fn playback_loop(
    context: &ThreadSafeContext,
    mut reader: CheckpointReader,
    update_settings: &KnowledgeUpdateSettings,
    clock: &PlaybackClock,
    stop: &StopToken,
) -> Result<u64> {
    if !reader.start()? {
        return Ok(0);
    }

    let mut applied = 0u64;
    let mut previous: Option<(Instant, u64)> = None;

    while !stop.is_stopped() {
        let (key, record) = match reader.next()? {
            Some(entry) => entry,
            None => break,
        };

        let release = match previous {
            None => {
                clock.first_record(record.toi);
                Instant::now()
            }
            Some((previous_release, previous_toi)) => {
                let wait = clock.real_wait(record.toi.saturating_sub(previous_toi));
                let release = match previous_release.checked_add(wait) {
                    Some(release) => release,
                    None => {
                        stop.wait_timeout(wait);
                        break;
                    }
                };
                let now = Instant::now();
                if release > now && stop.wait_timeout(release - now) {
                    break;
                }
                release
            }
        };
        previous = Some((release, record.toi));

        context.update_record_from_external(&key, &record, update_settings);
        applied += 1;
    }

    debug!(
        target: "madara::player",
        applied,
        stopped = stop.is_stopped(),
        "Playback finished"
    );
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token_interrupts_wait() {
        let token = StopToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let stopped = token.wait_timeout(Duration::from_secs(30));
                (stopped, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        token.stop();

        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
        assert!(token.is_stopped());
    }

    #[test]
    fn test_stop_token_times_out() {
        let token = StopToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(5)));
        assert!(!token.is_stopped());
    }

    struct Rate(f64);

    impl SimTimeSource for Rate {
        fn start(&self, _first_toi: u64) {}

        fn rate(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_simulated_clock_scales_waits() {
        let second = 1_000_000_000;
        assert_eq!(PlaybackClock::Realtime.real_wait(second), Duration::from_secs(1));

        let fast = PlaybackClock::Simulated(Arc::new(Rate(4.0)));
        assert_eq!(fast.real_wait(second), Duration::from_millis(250));

        let frozen = PlaybackClock::Simulated(Arc::new(Rate(0.0)));
        assert_eq!(frozen.real_wait(second), Duration::ZERO);

        let crawling = PlaybackClock::Simulated(Arc::new(Rate(1e-300)));
        assert_eq!(crawling.real_wait(second), Duration::MAX);
    }

    #[test]
    fn test_stop_token_unbounded_wait() {
        let token = StopToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || token.wait_timeout(Duration::MAX))
        };
        thread::sleep(Duration::from_millis(20));
        token.stop();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_stop_without_start() {
        let mut player = CheckpointPlayer::new(
            Arc::new(ThreadSafeContext::new()),
            CheckpointSettings::new("/nonexistent/file.kkb"),
            KnowledgeUpdateSettings::default(),
        );
        assert_eq!(player.stop().unwrap(), 0);
    }
}
