//! Completion aggregation and updates against the in-memory gateway.

use plansmith_core::completion::{CompletionAggregator, CompletionSummary};
use plansmith_core::error::{ErrorKind, GatewayError};
use plansmith_test_utils::{Call, FakeGateway, Op, fault};

#[tokio::test]
async fn empty_bucket_is_all_complete() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    let aggregator = CompletionAggregator::new(&gateway);
    assert!(aggregator.all_complete(&bucket.id).await.unwrap());
}

#[tokio::test]
async fn all_complete_requires_every_task_at_100() {
    let gateway = FakeGateway::new();
    let done = gateway.add_bucket("p", "Done");
    let open = gateway.add_bucket("p", "Open");
    for _ in 0..3 {
        gateway.add_task(&done.id, "t", Some(100));
    }
    gateway.add_task(&open.id, "a", Some(100));
    gateway.add_task(&open.id, "b", Some(100));
    gateway.add_task(&open.id, "c", Some(99));

    let aggregator = CompletionAggregator::new(&gateway);
    assert!(aggregator.all_complete(&done.id).await.unwrap());
    assert!(!aggregator.all_complete(&open.id).await.unwrap());
}

#[tokio::test]
async fn summary_counts_each_state() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    gateway.add_task(&bucket.id, "a", Some(100));
    gateway.add_task(&bucket.id, "b", Some(50));
    gateway.add_task(&bucket.id, "c", None);
    gateway.add_task(&bucket.id, "d", Some(0));

    let summary = CompletionAggregator::new(&gateway)
        .summary(&bucket.id)
        .await
        .unwrap();
    assert_eq!(
        summary,
        CompletionSummary {
            total: 4,
            completed: 1,
            in_progress: 1,
            not_started: 2,
        }
    );
}

#[tokio::test]
async fn gateway_errors_surface_without_retry() {
    let gateway = FakeGateway::new();
    gateway.fail_next(Op::ListBucketTasks, fault(ErrorKind::Transient));

    let err = CompletionAggregator::new(&gateway)
        .all_complete("b")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Transient));
    assert_eq!(gateway.calls_of(Op::ListBucketTasks).len(), 1);
}

#[tokio::test]
async fn mark_complete_reads_before_writing() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    let task = gateway.add_task(&bucket.id, "a", Some(40));
    // Someone else edits the task after we first saw it.
    gateway.touch_task(&task.id);

    CompletionAggregator::new(&gateway)
        .mark_complete(&task.id)
        .await
        .unwrap();

    assert_eq!(gateway.task(&task.id).unwrap().percent_complete, Some(100));
    assert_eq!(
        gateway.calls(),
        vec![
            Call::GetTask(task.id.clone()),
            Call::UpdateTaskCompletion {
                task_id: task.id.clone(),
                percent: 100,
            },
        ]
    );
}

#[tokio::test]
async fn mark_complete_is_a_noop_when_already_done() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    let task = gateway.add_task(&bucket.id, "a", Some(100));

    CompletionAggregator::new(&gateway)
        .mark_complete(&task.id)
        .await
        .unwrap();
    assert!(gateway.calls_of(Op::UpdateTaskCompletion).is_empty());
}

#[tokio::test]
async fn lost_race_surfaces_stale_version() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    let task = gateway.add_task(&bucket.id, "a", Some(0));
    gateway.fail_next(
        Op::UpdateTaskCompletion,
        GatewayError::StaleVersion {
            task_id: task.id.clone(),
        },
    );

    let err = CompletionAggregator::new(&gateway)
        .set_completion(&task.id, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::StaleVersion { .. }));
    assert_eq!(gateway.task(&task.id).unwrap().percent_complete, Some(0));
}

#[tokio::test]
async fn set_completion_rejects_out_of_range_percent() {
    let gateway = FakeGateway::new();
    let err = CompletionAggregator::new(&gateway)
        .set_completion("t", 101)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Fatal));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn missing_task_is_not_found() {
    let gateway = FakeGateway::new();
    let err = CompletionAggregator::new(&gateway)
        .mark_complete("nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn progress_lists_once_and_agrees_with_summary() {
    let gateway = FakeGateway::new();
    let bucket = gateway.add_bucket("p", "B");
    gateway.add_task(&bucket.id, "a", Some(100));
    gateway.add_task(&bucket.id, "b", Some(40));
    gateway.add_task(&bucket.id, "c", None);

    let aggregator = CompletionAggregator::new(&gateway);
    let progress = aggregator.progress(&bucket.id).await.unwrap();
    assert_eq!(gateway.calls_of(Op::ListBucketTasks).len(), 1);

    assert_eq!(progress.tasks.len(), 3);
    assert!(!progress.all_complete());
    assert_eq!(
        progress.summary,
        CompletionSummary {
            total: 3,
            completed: 1,
            in_progress: 1,
            not_started: 1,
        }
    );
    assert_eq!(aggregator.summary(&bucket.id).await.unwrap(), progress.summary);
}
