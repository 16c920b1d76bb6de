//! Test: Cancellation - teardown kills the running process and reports nothing

use crate::helpers::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use venv_pipeline::core::{PipelineStatus, ProvisionError, StepKind};
use venv_pipeline::execution::ScriptFetcher;

/// Cancelling mid-command kills the process and fires no completion
#[tokio::test]
async fn test_cancel_kills_running_process() {
    let fixture = Fixture::new();
    fixture.create_environment(true);
    fixture
        .launcher
        .on(StepKind::InstallPackageManager, StepScript::hang().stdout("resolving"));

    let (handle, completions) = fixture.start(&["pkgA"]);

    let launcher = fixture.launcher.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            launcher.launched().contains(&StepKind::InstallPackageManager)
        })
        .await
    );
    assert_eq!(handle.status(), PipelineStatus::Running);

    handle.cancel();
    let state = handle.wait().await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Cancelled);
    assert_eq!(state.current_index(), 1);
    assert!(completions.lock().unwrap().is_empty());
    assert!(fixture.messages.messages().is_empty());
    assert!(fixture.progress.dismissed());

    let log = fixture.launcher.log();
    assert_eq!(
        log.last(),
        Some(&LaunchRecord::Killed(StepKind::InstallPackageManager))
    );
    assert!(!fixture
        .launcher
        .launched()
        .contains(&StepKind::InstallPackage("pkgA".into())));
}

/// Cancelling a finished pipeline changes nothing
#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let fixture = Fixture::new();
    fixture.create_environment(true);

    let (handle, completions) = fixture.start(&[]);
    let done = completions.clone();
    assert!(wait_until(Duration::from_secs(5), || done.lock().unwrap().len() == 1).await);

    handle.cancel();
    let state = handle.wait().await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Succeeded);
    assert_eq!(completions.lock().unwrap().len(), 1);
}

/// Dropping the handle detaches; the pipeline still completes
#[tokio::test]
async fn test_dropped_handle_detaches() {
    let fixture = Fixture::new();
    fixture.create_environment(true);

    let (handle, completions) = fixture.start(&["pkgA"]);
    drop(handle);

    let done = completions.clone();
    assert!(wait_until(Duration::from_secs(5), || done.lock().unwrap().len() == 1).await);
    assert!(completions.lock().unwrap()[0].success);
    assert_eq!(fixture.launcher.launched().len(), 3);
}

/// Serves nothing until the run is torn down
#[derive(Default)]
struct StallingFetcher {
    fetches: AtomicUsize,
}

#[async_trait]
impl ScriptFetcher for StallingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ProvisionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Cancelling while the bootstrap script downloads ends the run promptly
#[tokio::test]
async fn test_cancel_during_bootstrap_download() {
    let fixture = Fixture::new();
    fixture.launcher.on(
        StepKind::CreateEnvironment,
        StepScript::ok().creates(fixture.env_python()),
    );
    let fetcher = Arc::new(StallingFetcher::default());

    let completions = Arc::new(Mutex::new(Vec::new()));
    let recorder = completions.clone();
    let handle = fixture
        .provisioner(&["pkgA"])
        .with_fetcher(fetcher.clone())
        .start(fixture.progress.clone(), move |success, _path, _output| {
            recorder.lock().unwrap().push(success);
        });

    let stalled = fetcher.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            stalled.fetches.load(Ordering::SeqCst) == 1
        })
        .await
    );

    handle.cancel();
    let state = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("cancellation must not wait for the download")
        .unwrap();

    assert_eq!(state.status(), PipelineStatus::Cancelled);
    assert!(completions.lock().unwrap().is_empty());
    assert!(fixture.messages.messages().is_empty());
    assert_eq!(fixture.launcher.launched(), vec![StepKind::CreateEnvironment]);
    assert!(!fixture.env_root().join("bin/get-pip.py").exists());
}
