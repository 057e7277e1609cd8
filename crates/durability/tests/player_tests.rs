//! Timed replay of checkpoint files

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use madara_core::{KnowledgeRecord, KnowledgeValue};
use madara_durability::{
    save_checkpoint, CheckpointPlayer, CheckpointSettings, PlaybackClock, SimTimeSource,
};
use madara_storage::{KnowledgeUpdateSettings, ThreadSafeContext};
use tempfile::tempdir;

const MILLI: u64 = 1_000_000;

fn update() -> KnowledgeUpdateSettings {
    KnowledgeUpdateSettings::default()
}

/// One checkpoint per `(key, toi)`, each holding a single record
fn write_timeline(path: &Path, timeline: &[(&str, u64)]) {
    let ctx = ThreadSafeContext::new();
    let settings = CheckpointSettings::new(path);
    for (i, (key, toi)) in timeline.iter().enumerate() {
        let record = KnowledgeRecord::new(i as i64).with_toi(*toi);
        assert!(ctx.update_record_from_external(key, &record, &update()).is_applied());
        save_checkpoint(&ctx, &settings).unwrap();
    }
}

fn player(path: &Path, ctx: &Arc<ThreadSafeContext>) -> CheckpointPlayer {
    CheckpointPlayer::new(Arc::clone(ctx), CheckpointSettings::new(path), update())
}

/// Instant at which each key first appeared in `ctx`, polled every millisecond
fn watch_arrivals(ctx: &ThreadSafeContext, keys: &[&str], limit: Duration) -> Vec<Option<Instant>> {
    let started = Instant::now();
    let mut seen = vec![None; keys.len()];
    while seen.iter().any(Option::is_none) && started.elapsed() < limit {
        for (slot, key) in seen.iter_mut().zip(keys) {
            if slot.is_none() && ctx.exists(key) {
                *slot = Some(Instant::now());
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    seen
}

#[test]
fn test_replay_follows_recorded_cadence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.kkb");
    let base = 5_000 * MILLI;
    write_timeline(
        &path,
        &[("a", base), ("b", base + 100 * MILLI), ("c", base + 250 * MILLI)],
    );

    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx);
    player.start().unwrap();
    let arrivals = watch_arrivals(&ctx, &["a", "b", "c"], Duration::from_secs(5));
    assert_eq!(player.join().unwrap(), 3);

    let arrivals: Vec<Instant> = arrivals
        .into_iter()
        .map(|t| t.expect("record never applied"))
        .collect();
    let first_gap = arrivals[1] - arrivals[0];
    let second_gap = arrivals[2] - arrivals[1];
    assert!(
        first_gap >= Duration::from_millis(90) && first_gap < Duration::from_millis(400),
        "a -> b took {:?}",
        first_gap
    );
    assert!(
        second_gap >= Duration::from_millis(140) && second_gap < Duration::from_millis(450),
        "b -> c took {:?}",
        second_gap
    );

    assert_eq!(ctx.get_value("a"), KnowledgeValue::Integer(0));
    assert_eq!(ctx.get_value("c"), KnowledgeValue::Integer(2));
    assert_eq!(ctx.get("c").unwrap().toi, base + 250 * MILLI);
}

#[test]
fn test_records_appear_over_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("progress.kkb");
    write_timeline(&path, &[("first", 0), ("second", 300 * MILLI)]);

    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx);
    player.start().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert!(ctx.exists("first"));
    assert!(!ctx.exists("second"));

    assert_eq!(player.join().unwrap(), 2);
    assert!(ctx.exists("second"));
}

#[test]
fn test_stop_interrupts_long_wait() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stop.kkb");
    write_timeline(&path, &[("now", 0), ("much_later", 60_000 * MILLI)]);

    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx);
    player.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(player.is_running());

    let stopping = Instant::now();
    assert_eq!(player.stop().unwrap(), 1);
    assert!(stopping.elapsed() < Duration::from_secs(5));
    assert!(!player.is_running());
    assert!(ctx.exists("now"));
    assert!(!ctx.exists("much_later"));
}

#[test]
fn test_start_twice_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("twice.kkb");
    write_timeline(&path, &[("a", 0), ("b", 60_000 * MILLI)]);

    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx);
    player.start().unwrap();
    assert!(player.start().is_err());
    assert!(player.play_until(u64::MAX).is_err());
    player.stop().unwrap();
}

#[test]
fn test_missing_file_plays_nothing() {
    let dir = tempdir().unwrap();
    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&dir.path().join("missing.kkb"), &ctx);
    player.start().unwrap();
    assert_eq!(player.join().unwrap(), 0);
    assert!(ctx.is_empty());
}

#[test]
fn test_play_until_steps_through_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("steps.kkb");
    write_timeline(&path, &[("s1", 10), ("s2", 20), ("s3", 30), ("s4", 40)]);

    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx);

    assert_eq!(player.play_until(20).unwrap(), 2);
    assert_eq!(ctx.keys(), vec!["s1".to_string(), "s2".to_string()]);

    assert_eq!(player.play_until(25).unwrap(), 1);
    assert!(ctx.exists("s3"));

    assert_eq!(player.play_until(u64::MAX).unwrap(), 1);
    assert_eq!(player.play_until(u64::MAX).unwrap(), 0);
    assert_eq!(ctx.len(), 4);
}

struct FastClock {
    rate: f64,
    first_toi: AtomicU64,
}

impl SimTimeSource for FastClock {
    fn start(&self, first_toi: u64) {
        self.first_toi.store(first_toi, Ordering::SeqCst);
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

#[test]
fn test_simulated_clock_speeds_up_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("simulated.kkb");
    let base = 42 * MILLI;
    write_timeline(&path, &[("a", base), ("b", base + 10_000 * MILLI)]);

    let clock = Arc::new(FastClock {
        rate: 1000.0,
        first_toi: AtomicU64::new(0),
    });
    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx).with_clock(PlaybackClock::Simulated(clock.clone()));

    let started = Instant::now();
    player.start().unwrap();
    assert_eq!(player.join().unwrap(), 2);

    // 10 simulated seconds at 1000x
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(clock.first_toi.load(Ordering::SeqCst), base);
}

#[test]
fn test_extreme_simulated_rate_still_stops() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crawl.kkb");
    write_timeline(&path, &[("a", 0), ("b", 1_000 * MILLI)]);

    let clock = Arc::new(FastClock {
        rate: 1e-300,
        first_toi: AtomicU64::new(0),
    });
    let ctx = Arc::new(ThreadSafeContext::new());
    let mut player = player(&path, &ctx).with_clock(PlaybackClock::Simulated(clock));
    player.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(player.stop().unwrap(), 1);
    assert!(ctx.exists("a"));
    assert!(!ctx.exists("b"));
}
