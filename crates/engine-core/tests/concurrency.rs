// crates/engine-core/tests/concurrency.rs
//
// Properties that only show up with several threads hitting one engine.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use engine_core::{MatchingEngine, NewOrder, OrderStatus, Side, TrackedState};

fn buy(id: u32, instrument: &str, price: u32, qty: u32) -> NewOrder {
    NewOrder::new(id, Side::Buy, instrument, price, qty)
}

fn sell(id: u32, instrument: &str, price: u32, qty: u32) -> NewOrder {
    NewOrder::new(id, Side::Sell, instrument, price, qty)
}

#[test]
fn sequence_is_taken_inside_the_critical_section() {
    let engine = MatchingEngine::new();
    engine.place(buy(0, "GOOG", 2700, 1)).unwrap();
    let book = engine.book("GOOG").unwrap();

    thread::scope(|s| {
        let held = book.lock();

        let placer = s.spawn(|| engine.place(buy(1, "GOOG", 2700, 1)).unwrap());

        // The placer has claimed its id and is now queued on the lock.
        while engine.order_state(1) != TrackedState::Submitted {
            thread::yield_now();
        }
        assert_eq!(held.next_sequence(), 1, "sequence assigned before the lock was held");
        drop(held);

        let outcome = placer.join().unwrap();
        assert_eq!(outcome.sequence, 1);
    });
}

#[test]
fn concurrent_adds_fill_in_lock_order() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 250;
    let engine = MatchingEngine::new();

    let sequences: HashMap<u32, u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|tid| {
                let engine = &engine;
                s.spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let id = tid * PER_THREAD + i;
                            (id, engine.place(buy(id, "GOOG", 2700, 1)).unwrap().sequence)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let total = THREADS * PER_THREAD;
    let sweep = engine.place(sell(total, "GOOG", 2700, total)).unwrap();
    assert_eq!(sweep.status, OrderStatus::Filled);
    assert_eq!(sweep.trades.len() as u32, total);

    let fill_sequences: Vec<u64> = sweep.trades.iter().map(|t| sequences[&t.resting_id]).collect();
    assert!(fill_sequences.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn concurrent_executions_against_one_order_count_in_lock_order() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 100;
    let engine = MatchingEngine::new();
    let big = THREADS * PER_THREAD;
    engine.place(sell(1_000_000, "GOOG", 2700, big)).unwrap();

    let mut trades: Vec<(u64, u32)> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|tid| {
                let engine = &engine;
                s.spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let out = engine.place(buy(tid * PER_THREAD + i, "GOOG", 2700, 1)).unwrap();
                            assert_eq!(out.trades.len(), 1);
                            (out.sequence, out.trades[0].execution_id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    trades.sort_unstable();
    let execution_ids: Vec<u32> = trades.iter().map(|&(_, e)| e).collect();
    assert_eq!(execution_ids, (1..=big).collect::<Vec<_>>());
    assert_eq!(engine.order_status(1_000_000), Some(OrderStatus::Filled));
}

#[test]
fn concurrent_cancels_of_distinct_orders_all_succeed() {
    const ORDERS: u32 = 2_000;
    let engine = MatchingEngine::new();
    for id in 0..ORDERS {
        let price = 1000 + id % 50;
        engine.place(buy(id, "AMZN", price, 1 + id % 7)).unwrap();
    }

    let accepted: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8u32)
            .map(|tid| {
                let engine = &engine;
                s.spawn(move || {
                    (0..ORDERS)
                        .filter(|id| id % 8 == tid)
                        .filter(|&id| engine.cancel(id).is_cancelled())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(accepted, ORDERS as usize);
    let book = engine.book("AMZN").unwrap();
    let guard = book.lock();
    assert!(guard.is_empty());
    guard.check_invariants().unwrap();
}

#[test]
fn cancel_and_crossing_order_never_both_win() {
    let engine = MatchingEngine::new();

    for round in 0..500u32 {
        let resting = round * 2;
        let aggressor = round * 2 + 1;
        engine.place(buy(resting, "GOOG", 2700, 1)).unwrap();

        let (cancelled, filled) = thread::scope(|s| {
            let c = s.spawn(|| engine.cancel(resting).is_cancelled());
            let f = s.spawn(|| !engine.place(sell(aggressor, "GOOG", 2700, 1)).unwrap().trades.is_empty());
            (c.join().unwrap(), f.join().unwrap())
        });

        assert!(cancelled ^ filled, "round {round}: cancelled={cancelled} filled={filled}");
        if cancelled {
            // The sell rested instead; clear it for the next round.
            assert!(engine.cancel(aggressor).is_cancelled());
            assert_eq!(engine.order_status(resting), Some(OrderStatus::Cancelled));
        } else {
            assert_eq!(engine.order_status(resting), Some(OrderStatus::Filled));
        }
    }

    let book = engine.book("GOOG").unwrap();
    let guard = book.lock();
    assert!(guard.is_empty());
    guard.check_invariants().unwrap();
}

#[test]
fn locked_instrument_does_not_block_others() {
    let engine = Arc::new(MatchingEngine::new());
    engine.place(buy(1, "GOOG", 2700, 1)).unwrap();
    let goog = engine.book("GOOG").unwrap();
    let _held = goog.lock();

    let (tx, rx) = mpsc::channel();
    let worker = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine.place(buy(2, "AMZN", 100, 1)).unwrap();
            engine.place(sell(3, "AMZN", 100, 1)).unwrap();
            let _ = tx.send(engine.cancel(2).is_cancelled());
        })
    };

    let cancelled = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("AMZN work blocked behind the GOOG lock");
    assert!(!cancelled);
    worker.join().unwrap();
}

#[test]
fn mixed_load_conserves_quantity() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 400;
    let engine = MatchingEngine::new();
    let instruments = ["GOOG", "AMZN", "AAPL"];

    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|tid| {
                let engine = &engine;
                s.spawn(move || {
                    let mut out = Vec::new();
                    for i in 0..PER_THREAD {
                        let id = tid * PER_THREAD + i;
                        let instrument = instruments[(id % 3) as usize];
                        let side = if (id / 3) % 2 == 0 { Side::Buy } else { Side::Sell };
                        let price = 95 + (id * 7919) % 11;
                        let qty = 1 + id % 9;
                        let placed = engine
                            .place(NewOrder::new(id, side, instrument, price, qty))
                            .unwrap();
                        out.push((qty, placed));
                        if i % 5 == 4 {
                            engine.cancel(id - 2);
                        }
                    }
                    out
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    let mut traded_as_incoming = 0u64;
    for (qty, placed) in &outcomes {
        let filled: u32 = placed.trades.iter().map(|t| t.quantity).sum();
        assert_eq!(filled, placed.filled_qty);
        assert_eq!(placed.filled_qty + placed.remaining_qty, *qty);
        traded_as_incoming += u64::from(filled);
    }
    assert_eq!(engine.stats().traded_volume, traded_as_incoming);

    for instrument in instruments {
        engine.book(instrument).unwrap().lock().check_invariants().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_after_place_returns_without_help() {
    let engine = MatchingEngine::new();
    engine.place(buy(1, "GOOG", 2700, 1)).unwrap();
    engine.place(sell(2, "GOOG", 2700, 2)).unwrap();

    assert_eq!(engine.wait(1).await, Ok(OrderStatus::Filled));
    assert_eq!(engine.wait(2).await, Ok(OrderStatus::PartiallyFilled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_issued_before_place_wakes_on_processing() {
    let engine = Arc::new(MatchingEngine::new());

    let waiters: Vec<_> = (0..16u32)
        .map(|id| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.wait(id).await })
        })
        .collect();

    let placer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for id in 0..16u32 {
                let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
                engine.place(NewOrder::new(id, side, "GOOG", 2700, 1)).unwrap();
            }
        })
    };
    placer.await.unwrap();

    for waiter in waiters {
        let status = tokio::time::timeout(Duration::from_secs(10), waiter)
            .await
            .expect("waiter never woke")
            .unwrap()
            .unwrap();
        assert!(matches!(status, OrderStatus::Resting | OrderStatus::Filled));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_sees_cancelled_orders() {
    let engine = MatchingEngine::new();
    engine.place(sell(4, "AAPL", 10, 1)).unwrap();
    engine.cancel(4);
    assert_eq!(engine.wait(4).await, Ok(OrderStatus::Cancelled));
}
