//! Property-Based Tests for the Cache
//!
//! # Test Properties
//!
//! 1. **Model Equivalence**: an unbounded cache behaves like a `HashMap`
//! 2. **No Stale Reads**: a bounded cache may forget keys but never returns
//!    a value other than the last one written
//! 3. **Queue FIFO**: the arena pops blocks in push order across wraps and growth
//! 4. **Iterator Completeness**: iteration yields every live key exactly once

#![cfg(test)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use proptest::prelude::*;

use super::queue::{BytesQueue, QueueError};
use super::{Cache, Config};
use crate::error::Error;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set(u8, Vec<u8>),
    Get(u8),
    Delete(u8),
}

/// Keys are drawn from a small space so operations collide often.
fn key(k: u8) -> String {
    format!("key-{}", k % 32)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<u8>(), prop::collection::vec(any::<u8>(), 0..96)).prop_map(|(k, v)| Op::Set(k, v)),
        3 => any::<u8>().prop_map(Op::Get),
        1 => any::<u8>().prop_map(Op::Delete),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..300)
}

fn small_config(shards: usize) -> Config {
    let mut config = Config::new(shards, Duration::ZERO);
    config.max_entries_in_window = 16;
    config.max_entry_size = 32;
    config
}

// =============================================================================
// Cache Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Without a cap or life window nothing is ever evicted.
    #[test]
    fn prop_unbounded_cache_matches_model(ops in ops_strategy(), shard_bits in 0u32..4) {
        let cache = Cache::new(small_config(1 << shard_bits))?;
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    cache.set(&key(k), &v)?;
                    model.insert(key(k), v);
                }
                Op::Get(k) => match model.get(&key(k)) {
                    Some(expected) => {
                        let got = cache.get(&key(k))?;
                        prop_assert_eq!(got.as_ref(), &expected[..]);
                    }
                    None => prop_assert!(matches!(cache.get(&key(k)), Err(Error::EntryNotFound))),
                },
                Op::Delete(k) => {
                    let deleted = cache.delete(&key(k)).is_ok();
                    prop_assert_eq!(deleted, model.remove(&key(k)).is_some());
                }
            }
        }
        prop_assert_eq!(cache.len(), model.len() as u64);
    }

    /// Property: Eviction under a hard cap loses keys, never values.
    #[test]
    fn prop_bounded_cache_never_returns_stale_values(ops in ops_strategy()) {
        let mut config = small_config(2);
        config.hard_max_cache_size = 1024;
        let cache = Cache::new(config)?;
        let mut latest: HashMap<String, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    cache.set(&key(k), &v)?;
                    latest.insert(key(k), v);
                }
                Op::Get(k) => match cache.get(&key(k)) {
                    Ok(value) => {
                        let expected = latest.get(&key(k));
                        prop_assert_eq!(Some(&value.to_vec()), expected);
                    }
                    Err(err) => prop_assert!(err.is_not_found()),
                },
                Op::Delete(k) => {
                    let _ = cache.delete(&key(k));
                    latest.remove(&key(k));
                }
            }
            prop_assert!(cache.capacity() <= 1024);
        }
    }

    /// Property: Every live key is yielded exactly once.
    #[test]
    fn prop_iterator_yields_live_keys_once(ops in ops_strategy()) {
        let cache = Cache::new(small_config(4))?;
        let mut model: HashSet<String> = HashSet::new();

        for op in ops {
            match op {
                Op::Set(k, v) => {
                    cache.set(&key(k), &v)?;
                    model.insert(key(k));
                }
                Op::Delete(k) => {
                    let _ = cache.delete(&key(k));
                    model.remove(&key(k));
                }
                Op::Get(_) => {}
            }
        }

        let mut seen = HashSet::new();
        for entry in cache.iterator() {
            prop_assert!(seen.insert(entry.key().to_string()));
        }
        prop_assert_eq!(seen, model);
    }
}

// =============================================================================
// Queue Properties
// =============================================================================

#[derive(Debug, Clone)]
enum QueueOp {
    Push(Vec<u8>),
    Pop,
}

fn queue_ops_strategy() -> impl Strategy<Value = Vec<QueueOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => prop::collection::vec(any::<u8>(), 0..48).prop_map(QueueOp::Push),
            2 => Just(QueueOp::Pop),
        ],
        1..400,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Blocks come out in push order with their offsets intact.
    #[test]
    fn prop_queue_is_fifo(ops in queue_ops_strategy(), bounded in any::<bool>()) {
        let max = bounded.then_some(256);
        let mut queue = BytesQueue::new(32, max);
        let mut model: VecDeque<(usize, Vec<u8>)> = VecDeque::new();

        for op in ops {
            match op {
                QueueOp::Push(data) => match queue.push(&data) {
                    Ok(pushed) => {
                        if let Some(relocation) = pushed.relocation {
                            for (offset, _) in model.iter_mut() {
                                *offset = relocation.apply(*offset);
                            }
                        }
                        model.push_back((pushed.offset, data));
                    }
                    Err(QueueError::Full { .. }) => prop_assert!(bounded),
                    Err(err) => return Err(TestCaseError::fail(format!("push failed: {}", err))),
                },
                QueueOp::Pop => match model.pop_front() {
                    Some((offset, data)) => {
                        let (popped_at, block) = queue.pop()?;
                        prop_assert_eq!(popped_at, offset);
                        prop_assert_eq!(block, &data[..]);
                    }
                    None => prop_assert!(matches!(queue.pop(), Err(QueueError::Empty))),
                },
            }

            prop_assert_eq!(queue.len(), model.len());
            if let Some(max) = max {
                prop_assert!(queue.capacity() <= max);
            }
            for (offset, data) in &model {
                prop_assert_eq!(queue.peek(*offset)?, &data[..]);
            }
        }
    }
}
