//! Test: No Interpreter - a missing base interpreter fails before any process runs

use crate::helpers::*;
use venv_pipeline::execution::MessageLevel;

#[tokio::test]
async fn test_missing_interpreter_reports_once() {
    let fixture = Fixture::without_interpreter();

    let result = fixture.run(&["pkgA"]).await;

    assert_failed_at(&result, 0);
    let completion = result.completion();
    assert_eq!(completion.environment_path, fixture.env_root());
    assert!(completion
        .output
        .contains("No suitable Python installation found"));
    assert!(completion.output.contains("python.org"));
    assert!(fixture.launcher.launched().is_empty());

    let messages = fixture.messages.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, MessageLevel::Critical);
}

#[tokio::test]
async fn test_plan_surfaces_missing_interpreter() {
    let fixture = Fixture::without_interpreter();
    let error = fixture.provisioner(&["pkgA"]).plan().unwrap_err();
    assert!(error.to_string().contains("No suitable Python installation found"));
}
