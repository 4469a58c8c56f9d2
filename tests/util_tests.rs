//! Tests for the timeout helpers.

use std::time::Duration;

use colloquy::error::ColloquyError;
use colloquy::util::timeout::{maybe_timeout, with_timeout};

#[tokio::test(start_paused = true)]
async fn with_timeout_reports_elapsed_budget_in_millis() {
    let result = with_timeout(Duration::from_millis(250), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, ColloquyError>(())
    })
    .await;

    assert!(matches!(result, Err(ColloquyError::Timeout(250))));
}

#[tokio::test(start_paused = true)]
async fn maybe_timeout_without_budget_waits_for_completion() {
    let result = maybe_timeout(None, async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, ColloquyError>("finished")
    })
    .await;

    assert_eq!(result.unwrap(), "finished");
}
