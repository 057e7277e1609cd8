//! Multi-threaded access to the knowledge context

use std::sync::Arc;
use std::thread;

use madara_core::{KnowledgeRecord, KnowledgeValue};
use madara_storage::{KnowledgeUpdateSettings, ThreadSafeContext, UpdateStatus};
use rand::Rng;

#[test]
fn test_concurrent_writers_advance_clock() {
    let ctx = Arc::new(ThreadSafeContext::new());
    let threads = 8;
    let writes = 250;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let settings = KnowledgeUpdateSettings::default();
                for i in 0..writes {
                    ctx.set_integer(&format!("thread{}.var{}", t, i % 10), i, &settings);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ctx.clock(), (threads * writes) as u64);
    assert_eq!(ctx.len(), (threads * 10) as usize);
}

#[test]
fn test_arbitration_converges_to_highest_quality_then_clock() {
    let ctx = Arc::new(ThreadSafeContext::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let settings = KnowledgeUpdateSettings::default();
                let mut rng = rand::thread_rng();
                for _ in 0..500 {
                    let quality = rng.gen_range(0..5u32);
                    let clock = rng.gen_range(0..1000u64);
                    let record = KnowledgeRecord::new(clock as i64)
                        .with_quality(quality)
                        .with_clock(clock);
                    ctx.update_record_from_external("contested", &record, &settings);
                }
                // Always wins: quality above anything generated
                let winner = KnowledgeRecord::new(-1i64).with_quality(10).with_clock(0);
                ctx.update_record_from_external("contested", &winner, &settings);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let record = ctx.get("contested").unwrap();
    assert_eq!(record.quality, 10);
    assert_eq!(record.value, KnowledgeValue::Integer(-1));

    let loser = KnowledgeRecord::new(5i64).with_quality(10).with_clock(0);
    let settings = KnowledgeUpdateSettings::default();
    assert_eq!(
        ctx.update_record_from_external("contested", &loser, &settings),
        UpdateStatus::Applied,
        "equal quality and equal clock is accepted"
    );
}

#[test]
fn test_guard_blocks_other_threads() {
    let ctx = Arc::new(ThreadSafeContext::new());
    let settings = KnowledgeUpdateSettings::default();

    let guard = ctx.lock();
    ctx.set_integer("x", 1, &settings);

    let reader = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || ctx.get_value("x"))
    };

    ctx.set_integer("x", 2, &settings);
    drop(guard);

    // The reader could only run after the guard was released
    assert_eq!(reader.join().unwrap(), KnowledgeValue::Integer(2));
}
