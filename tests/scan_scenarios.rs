//! Scan Scenario Tests
//!
//! Drives complete learning and analysis passes through the acquisition loop
//! with scripted sensor lines, the way a recorded capture would replay.

use std::time::Duration;

use pipe_scan::acquisition::{ReplayItem, ReplaySource};
use pipe_scan::config::ScanSettings;
use pipe_scan::event_log::EventLog;
use pipe_scan::pipeline::{AcquisitionLoop, PollOutcome, ScanHandle};
use pipe_scan::scan::{IngestOutcome, Phase, ScanError};
use tokio_util::sync::CancellationToken;

fn handle() -> ScanHandle {
    ScanHandle::new(ScanSettings::default(), EventLog::unbounded())
}

fn replay(lines: &[&str], handle: &ScanHandle) -> AcquisitionLoop<ReplaySource> {
    AcquisitionLoop::new(
        ReplaySource::from_lines(lines.iter().copied()),
        handle.clone(),
        Duration::from_millis(1),
        CancellationToken::new(),
    )
}

/// Poll every scripted line and collect the outcomes.
async fn drain(lp: &mut AcquisitionLoop<ReplaySource>) -> Vec<PollOutcome> {
    let mut outcomes = Vec::new();
    while !lp.source().is_exhausted() {
        outcomes.push(lp.poll_once().await);
    }
    outcomes
}

/// Learn a constant baseline of `len` readings at `distance`.
async fn learn(handle: &ScanHandle, distance: u32, len: usize) {
    handle.start_learning();
    let line = format!("Distance:{distance}cm");
    let lines: Vec<&str> = std::iter::repeat(line.as_str()).take(len).collect();
    let mut lp = replay(&lines, handle);
    drain(&mut lp).await;
    assert!(handle.end_learning().changed);
}

fn blockages(outcomes: &[PollOutcome]) -> Vec<(usize, pipe_scan::BlockageEvent)> {
    outcomes
        .iter()
        .enumerate()
        .filter_map(|(i, o)| match o {
            PollOutcome::Ingested(outcome) => outcome.blockage().map(|b| (i, b)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn scenario_single_spike_is_reported_at_its_position() {
    let handle = handle();
    learn(&handle, 10, 5).await;
    tokio_test::assert_ok!(handle.start_analysis());

    let mut lp = replay(
        &[
            "Distance:10cm",
            "Distance:10cm",
            "Distance:10cm",
            "Distance:17cm",
            "Distance:10cm",
        ],
        &handle,
    );
    let outcomes = drain(&mut lp).await;

    // Detection needs the live scan to cover the whole baseline: only the 5th reading fires
    let found = blockages(&outcomes);
    assert_eq!(found.len(), 1);
    let (poll_index, event) = found[0];
    assert_eq!(poll_index, 4);
    assert_eq!(event.index, 3);
    assert_eq!(event.position, 3);
    assert_eq!(event.deviation, 7.0);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Analyzing);
    assert_eq!(snapshot.live_distances, vec![10.0, 10.0, 10.0, 17.0, 10.0]);
    assert_eq!(snapshot.live_positions, vec![0, 1, 2, 3, 4]);

    let log: Vec<String> = handle.get_log().into_iter().map(|e| e.message).collect();
    assert_eq!(
        log.last().map(String::as_str),
        Some("Blockage detected at 3 cm (deviation 7.0 cm)")
    );
}

#[tokio::test]
async fn scenario_small_deviations_never_fire() {
    let handle = handle();
    learn(&handle, 10, 5).await;
    handle.start_analysis().unwrap();

    let mut lp = replay(
        &[
            "Distance:10cm",
            "Distance:11cm",
            "Distance:9cm",
            "Distance:12cm",
            "Distance:10cm",
        ],
        &handle,
    );
    let outcomes = drain(&mut lp).await;

    assert!(blockages(&outcomes).is_empty());
    assert_eq!(handle.stats().blockages_detected, 0);
}

#[tokio::test]
async fn scenario_malformed_line_is_discarded() {
    let handle = handle();
    handle.start_learning();

    let mut lp = replay(&["Distance:cm"], &handle);
    let outcomes = drain(&mut lp).await;

    assert_eq!(outcomes, vec![PollOutcome::Rejected]);
    let snapshot = handle.snapshot();
    assert!(snapshot.baseline.is_empty());
    assert!(snapshot.live_distances.is_empty());
    assert_eq!(snapshot.phase, Phase::Learning);
}

#[tokio::test]
async fn deviation_equal_to_threshold_does_not_fire() {
    let handle = handle();
    learn(&handle, 10, 3).await;
    handle.start_analysis().unwrap();

    let mut lp = replay(&["Distance:10cm", "Distance:15cm", "Distance:10cm"], &handle);
    let outcomes = drain(&mut lp).await;
    assert!(blockages(&outcomes).is_empty());

    let mut lp = replay(&["Distance:10cm", "Distance:16cm", "Distance:10cm"], &handle);
    handle.start_analysis().unwrap();
    let outcomes = drain(&mut lp).await;
    let found = blockages(&outcomes);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.position, 1);
}

#[tokio::test]
async fn detection_keeps_firing_while_deviation_persists() {
    let handle = handle();
    learn(&handle, 10, 2).await;
    handle.start_analysis().unwrap();

    let mut lp = replay(
        &["Distance:20cm", "Distance:10cm", "Distance:10cm", "Distance:10cm"],
        &handle,
    );
    let outcomes = drain(&mut lp).await;

    // The spike at index 0 stays the maximum for every reading after the 2nd
    let found = blockages(&outcomes);
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|(_, e)| e.position == 0 && e.deviation == 10.0));
}

#[tokio::test]
async fn ties_report_the_first_position() {
    let handle = handle();
    learn(&handle, 10, 4).await;
    handle.start_analysis().unwrap();

    let mut lp = replay(
        &["Distance:10cm", "Distance:18cm", "Distance:2cm", "Distance:10cm"],
        &handle,
    );
    let found = blockages(&drain(&mut lp).await);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.position, 1);
}

#[tokio::test]
async fn sensor_step_scales_positions() {
    let settings = ScanSettings {
        sensor_step_cm: 5,
        ..ScanSettings::default()
    };
    let handle = ScanHandle::new(settings, EventLog::unbounded());
    learn(&handle, 10, 3).await;
    handle.start_analysis().unwrap();

    let mut lp = replay(&["Distance:10cm", "Distance:10cm", "Distance:30cm"], &handle);
    let found = blockages(&drain(&mut lp).await);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.position, 10);
    assert_eq!(handle.snapshot().live_positions, vec![0, 5, 10]);
}

#[tokio::test]
async fn analysis_requires_a_baseline() {
    let handle = handle();

    let err = tokio_test::assert_err!(handle.start_analysis());
    assert_eq!(err, ScanError::EmptyBaseline);
    assert_eq!(handle.phase(), Phase::Idle);

    // An empty learning pass does not help either
    handle.start_learning();
    handle.end_learning();
    assert!(handle.start_analysis().is_err());
    assert_eq!(handle.phase(), Phase::Idle);

    let log: Vec<String> = handle.get_log().into_iter().map(|e| e.message).collect();
    assert_eq!(log[0], "Error: finish a learning pass before starting analysis (baseline is empty)");
    assert_eq!(log[1], "Learning started");
    assert_eq!(log[2], "Learning finished");
}

#[tokio::test]
async fn start_learning_resets_everything() {
    let handle = handle();
    learn(&handle, 10, 3).await;
    handle.start_analysis().unwrap();
    let mut lp = replay(&["Distance:10cm", "Distance:11cm"], &handle);
    drain(&mut lp).await;

    handle.start_learning();
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Learning);
    assert!(snapshot.baseline.is_empty());
    assert!(snapshot.live_distances.is_empty());
    assert!(snapshot.live_positions.is_empty());

    // Positions start over in the next analysis pass
    let mut lp = replay(&["Distance:10cm"], &handle);
    drain(&mut lp).await;
    handle.end_learning();
    handle.start_analysis().unwrap();
    let mut lp = replay(&["Distance:10cm"], &handle);
    let outcomes = drain(&mut lp).await;
    assert_eq!(
        outcomes,
        vec![PollOutcome::Ingested(IngestOutcome::Live {
            position: 0,
            blockage: None
        })]
    );
}

#[tokio::test]
async fn transport_faults_do_not_stop_acquisition() {
    let handle = handle();
    handle.start_learning();

    let mut lp = AcquisitionLoop::new(
        ReplaySource::new(
            "flaky",
            vec![
                ReplayItem::Line("Distance:10cm".to_string()),
                ReplayItem::Fault("read error".to_string()),
                ReplayItem::Silence,
                ReplayItem::Line("Distance:11cm".to_string()),
            ],
        ),
        handle.clone(),
        Duration::from_millis(1),
        CancellationToken::new(),
    );
    while !lp.source().is_exhausted() {
        lp.poll_once().await;
    }

    assert_eq!(handle.snapshot().baseline, vec![10.0, 11.0]);
    let stats = handle.stats();
    assert_eq!(stats.transport_faults, 1);
    assert_eq!(stats.readings_accepted, 2);
}

#[tokio::test]
async fn commands_race_with_running_loop() {
    let handle = handle();
    let cancel = CancellationToken::new();
    let lines: Vec<String> = (0..200).map(|i| format!("Distance:{}cm", 10 + i % 3)).collect();
    let lp = AcquisitionLoop::new(
        ReplaySource::from_lines(lines),
        handle.clone(),
        Duration::from_millis(1),
        cancel.clone(),
    );
    let task = tokio::spawn(lp.run());

    handle.start_learning();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.end_learning();
    let _ = handle.start_analysis();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Every snapshot keeps live distances and positions in lockstep
    for _ in 0..10 {
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.live_distances.len(), snapshot.live_positions.len());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    cancel.cancel();
    let stats = task.await.unwrap();
    assert!(stats.readings_accepted > 0);
}

#[tokio::test]
async fn analysis_message_precedes_blockages_from_a_running_loop() {
    let handle = handle();
    learn(&handle, 10, 1).await;

    let cancel = CancellationToken::new();
    let lines: Vec<String> = (0..500).map(|_| "Distance:30cm".to_string()).collect();
    let task = tokio::spawn(
        AcquisitionLoop::new(
            ReplaySource::from_lines(lines),
            handle.clone(),
            Duration::from_millis(1),
            cancel.clone(),
        )
        .run(),
    );

    // Readings are already flowing (and discarded while idle) when analysis starts
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(tokio_test::assert_ok!(handle.start_analysis()), Phase::Analyzing);
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    task.await.unwrap();

    let log: Vec<String> = handle.get_log().into_iter().map(|e| e.message).collect();
    let started = log
        .iter()
        .position(|m| m == "Pipe analysis started")
        .unwrap();
    let first_blockage = log
        .iter()
        .position(|m| m.starts_with("Blockage detected"))
        .unwrap();
    assert!(started < first_blockage, "log order: {:?}", log);
}
