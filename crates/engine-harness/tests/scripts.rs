// crates/engine-harness/tests/scripts.rs
//
// End-to-end replays of small command scripts.

use std::time::Duration;

use engine_harness::{run_script, Config, RunReport};

async fn replay_with(config: Config, script: &str) -> (RunReport, Vec<String>) {
    let (report, out) = tokio::time::timeout(
        Duration::from_secs(20),
        run_script(&config, script.as_bytes(), Vec::new()),
    )
    .await
    .expect("script replay hung")
    .unwrap();
    (report, strip_timestamps(&out))
}

async fn replay(script: &str) -> (RunReport, Vec<String>) {
    replay_with(Config::default(), script).await
}

/// Output lines without their trailing timestamp.
fn strip_timestamps(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out)
        .lines()
        .map(|line| match line.rsplit_once(' ') {
            Some((head, _ts)) => head.to_string(),
            None => line.to_string(),
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn barrier_phases_fix_fill_order() {
    let (report, lines) = replay(
        "# two buys at one price, then a sweep
2
o
0 B 1 GOOG 2700 1
.
1 B 2 GOOG 2700 1
.
0 S 3 GOOG 2700 2
.
x
",
    )
    .await;

    assert_eq!(
        lines,
        vec![
            "B 1 GOOG 2700 1",
            "B 2 GOOG 2700 1",
            "E 1 3 1 2700 1",
            "E 2 3 1 2700 1",
        ]
    );
    assert!(report.clean_end);
    assert_eq!(report.aborted_sessions(), 0);
    assert_eq!(report.stats.trades, 2);
    assert_eq!(report.events_written, 4);
    assert_eq!(report.book("GOOG").unwrap().resting_orders, 0);
    assert_eq!(report.session(0).unwrap().barriers, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_adds_still_fill_in_sequence_order() {
    let mut script = String::from("8\no\n");
    for tid in 0..8 {
        script.push_str(&format!("{tid} B {tid} GOOG 2700 1\n"));
    }
    script.push_str(".\n0 S 100 GOOG 2700 8\n.\nx\n");

    let (report, lines) = replay(&script).await;

    // Whatever order the adds landed in, fills follow it exactly.
    let added: Vec<&str> = lines
        .iter()
        .filter(|l| l.starts_with("B "))
        .map(|l| l.split(' ').nth(1).unwrap())
        .collect();
    let filled: Vec<&str> = lines
        .iter()
        .filter(|l| l.starts_with("E "))
        .map(|l| l.split(' ').nth(1).unwrap())
        .collect();
    assert_eq!(added.len(), 8);
    assert_eq!(added, filled);
    assert_eq!(report.stats.traded_volume, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_orders_work_across_sessions() {
    let (report, lines) = replay(
        "2
o
1 w 5
1 C 5
0 B 5 AMZN 10 4
x
",
    )
    .await;

    assert_eq!(lines, vec!["B 5 AMZN 10 4", "X 5 A"]);
    assert_eq!(report.session(1).unwrap().applied, 2);
    assert_eq!(report.stats.cancels_accepted, 1);
    assert_eq!(report.book("AMZN").unwrap().resting_orders, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restricted_barrier_only_holds_its_participants() {
    let (report, lines) = replay(
        "3
o
0 B 1 GOOG 10 1
0,1 .
1 S 2 GOOG 10 1
0,1 .
2 B 3 AAPL 5 1
.
x
",
    )
    .await;

    let goog: Vec<&String> = lines.iter().filter(|l| !l.contains("AAPL")).collect();
    assert_eq!(goog, vec!["B 1 GOOG 10 1", "E 1 2 1 10 1"]);
    assert!(lines.iter().any(|l| l == "B 3 AAPL 5 1"));

    assert_eq!(report.session(0).unwrap().barriers, 3);
    assert_eq!(report.session(2).unwrap().barriers, 1);
    let aapl = report.book("AAPL").unwrap();
    assert_eq!((aapl.bid_price, aapl.bid_quantity), (5, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_line_aborts_only_its_session() {
    let (report, _) = replay(
        "2
o
0 B 1 GOOG 100 1
1 B 2 GOOG -5 1
1 B 3 GOOG 100 1
.
0 B 4 GOOG 101 1
1 C 1
.
x
",
    )
    .await;

    let healthy = report.session(0).unwrap();
    assert_eq!(healthy.applied, 2);
    assert!(!healthy.is_aborted());

    let broken = report.session(1).unwrap();
    assert!(broken.is_aborted());
    assert_eq!(broken.skipped, 2);
    assert_eq!(broken.barriers, 2);

    let goog = report.book("GOOG").unwrap();
    assert_eq!(goog.resting_orders, 2);
    assert_eq!(goog.bid_price, 101);
    assert_eq!(report.aborted_sessions(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unprefixed_commands_run_on_session_zero() {
    let (report, lines) = replay(
        "3
o
1 B 7 AMZN 20 2
w 7
C 7
x
",
    )
    .await;

    assert_eq!(lines, vec!["B 7 AMZN 20 2", "X 7 A"]);
    assert_eq!(report.session(0).unwrap().applied, 2);
    assert_eq!(report.session(1).unwrap().applied, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_session_script_without_prefixes() {
    let (report, lines) = replay(
        "1
o
B 1 AAPL 50 10
S 2 AAPL 49 4
C 1
C 1
x
",
    )
    .await;

    assert_eq!(
        lines,
        vec!["B 1 AAPL 50 10", "E 1 2 1 50 4", "X 1 A", "X 1 R"]
    );
    assert_eq!(report.stats.cancels_rejected, 1);
    assert!(report.book("AAPL").unwrap().resting_orders == 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_active_id_is_rejected_and_session_continues() {
    let (report, lines) = replay(
        "1
o
B 1 GOOG 10 1
B 1 GOOG 11 1
S 2 GOOG 10 1
x
",
    )
    .await;

    let session = report.session(0).unwrap();
    assert_eq!((session.applied, session.rejected), (2, 1));
    assert!(!session.is_aborted());
    assert_eq!(lines, vec!["B 1 GOOG 10 1", "E 1 2 1 10 1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_deadline_aborts_the_waiting_session() {
    let config = Config {
        wait_timeout: Some(Duration::from_millis(50)),
        ..Config::default()
    };
    let (report, _) = replay_with(
        config,
        "2
o
0 w 999
0 B 1 GOOG 10 1
1 B 2 GOOG 10 1
.
x
",
    )
    .await;

    let waiter = report.session(0).unwrap();
    assert!(waiter.failure.as_deref().unwrap().contains("999"));
    assert_eq!(waiter.skipped, 1);
    assert_eq!(waiter.barriers, 1);
    assert_eq!(report.session(1).unwrap().applied, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unattributable_lines_are_counted_and_skipped() {
    let (report, lines) = replay(
        "2
o
Q GOOG
5 B 1 GOOG 10 1
0,9 .
0 B 2 GOOG 10 1
",
    )
    .await;

    assert_eq!(report.unattributed_errors, 3);
    assert_eq!(report.aborted_sessions(), 0);
    assert!(!report.clean_end);
    assert_eq!(lines, vec!["B 2 GOOG 10 1"]);
}

#[tokio::test]
async fn events_can_be_disabled() {
    let config = Config {
        emit_events: false,
        ..Config::default()
    };
    let (report, lines) = replay_with(config, "1\no\nB 1 GOOG 10 1\nx\n").await;
    assert!(lines.is_empty());
    assert_eq!(report.events_written, 0);
    assert_eq!(report.stats.orders_accepted, 1);
}

#[tokio::test]
async fn header_problems_fail_the_run() {
    let config = Config {
        max_sessions: 4,
        ..Config::default()
    };
    assert!(run_script(&config, "8\no\nx\n".as_bytes(), Vec::new()).await.is_err());
    assert!(run_script(&config, "# nothing\n".as_bytes(), Vec::new()).await.is_err());
    assert!(run_script(&config, "B 1 GOOG 1 1\n".as_bytes(), Vec::new()).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_party_barrier_does_not_abort_its_session() {
    let (report, lines) = replay(
        "2
o
1 B 1 GOOG 10 1
1 .
1 S 2 GOOG 10 1
x
",
    )
    .await;

    let session = report.session(1).unwrap();
    assert!(!session.is_aborted());
    assert_eq!((session.applied, session.barriers), (2, 1));
    assert_eq!(lines, vec!["B 1 GOOG 10 1", "E 1 2 1 10 1"]);
}
