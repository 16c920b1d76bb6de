//! Test: Progress - counters, terminal states and delayed dismissal

use crate::helpers::*;
use std::time::Duration;
use venv_pipeline::core::StepKind;
use venv_pipeline::execution::ProgressEvent;

/// Progress counts finished commands and ends with success, then dismissal
#[tokio::test]
async fn test_progress_reports_each_step() {
    let fixture = Fixture::new();
    fixture.create_environment(true);

    let result = fixture.run(&["pkgA", "pkgB"]).await;
    assert_succeeded(&result);

    let events = fixture.progress.events();
    let done: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { snapshot } => {
                assert_eq!(snapshot.total_steps, 4);
                Some(snapshot.done_steps)
            }
            _ => None,
        })
        .collect();
    assert_eq!(done, vec![0, 1, 2, 3, 4]);

    match &events[0] {
        ProgressEvent::Progress { snapshot } => assert_eq!(snapshot.message, "Upgrading pip"),
        other => panic!("unexpected first event: {:?}", other),
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Success { snapshot } if snapshot.done_steps == 4)));

    let progress = fixture.progress.clone();
    assert!(wait_until(Duration::from_secs(2), || progress.dismissed()).await);
}

/// Failure is shown and stays up longer than a success would
#[tokio::test]
async fn test_failure_lingers_before_dismissal() {
    let fixture = Fixture::new();
    fixture.create_environment(true);
    fixture
        .launcher
        .on(
            StepKind::UpgradeInstaller,
            StepScript::exit(1).stdout("network unreachable"),
        );

    let result = fixture.run(&["pkgA"]).await;
    assert_failed_at(&result, 0);

    let events = fixture.progress.events();
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Failure { message, .. }
            if message.starts_with("Venv update failed: Command failed with exit code 1")
                && message.contains("Last output:")
                && message.contains("network unreachable")
    )));
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Success { .. })));

    // Success lingers 20ms, failure 300ms
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!fixture.progress.dismissed());

    let progress = fixture.progress.clone();
    assert!(wait_until(Duration::from_secs(3), || progress.dismissed()).await);
}
