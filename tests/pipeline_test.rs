mod common;

use std::sync::Arc;

use common::{
    build_pipeline, posting, FailingSource, FlakySeenStore, RecordingNotifier, StaticSource,
    DRAFT_MODEL, SCORE_MODEL,
};
use job_scout::llm_adapter::MockInferenceClient;
use job_scout::seen_store::{MemorySeenStore, SeenStore};
use job_scout::types::{ScoutError, SeenRecord};

#[tokio::test]
async fn high_match_is_drafted_notified_and_persisted() {
    let source = Arc::new(StaticSource::new(vec![posting("A1", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 85, "reason": "strong overlap with profile"}"#);
    llm.push_text("I can build this pipeline for you.");

    let pipeline = build_pipeline(source, seen.clone(), llm.clone(), notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.scored, 1);
    assert_eq!(summary.drafted, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(notifier.delivered_ids(), vec!["A1".to_string()]);

    let record = seen.get("A1").await.expect("A1 should be marked seen");
    assert!(record.last_notified_at.is_some());

    // The cheap model scores, the quality model drafts.
    let calls = llm.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, SCORE_MODEL);
    assert_eq!(calls[1].0, DRAFT_MODEL);
}

#[tokio::test]
async fn low_budget_posting_is_filtered_before_any_inference() {
    let source = Arc::new(StaticSource::new(vec![posting("A2", Some(10.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let pipeline = build_pipeline(source, seen.clone(), llm.clone(), notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.filtered_out, 1);
    assert_eq!(summary.scored, 0);
    assert_eq!(llm.call_count(), 0);
    assert!(notifier.delivered_ids().is_empty());

    // Filtered postings are still marked seen so they are never refetched,
    // but without a notification timestamp.
    let record = seen.get("A2").await.expect("A2 should be marked seen");
    assert!(record.last_notified_at.is_none());
}

#[tokio::test]
async fn seen_posting_is_skipped_entirely() {
    let source = Arc::new(StaticSource::new(vec![posting("A3", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    seen.mark_seen(&SeenRecord::new("A3", chrono::Utc::now()))
        .await
        .unwrap();
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let pipeline = build_pipeline(source, seen.clone(), llm.clone(), notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.skipped_seen, 1);
    assert_eq!(llm.call_count(), 0);
    assert!(notifier.delivered_ids().is_empty());
}

#[tokio::test]
async fn score_at_threshold_is_drafted() {
    let source = Arc::new(StaticSource::new(vec![posting("B1", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 70, "reason": "on the line"}"#);
    llm.push_text("Threshold matches still get a draft.");

    let pipeline = build_pipeline(source, seen.clone(), llm.clone(), notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    // The threshold is inclusive.
    assert_eq!(summary.drafted, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(notifier.delivered_ids(), vec!["B1".to_string()]);
}

#[tokio::test]
async fn below_threshold_is_not_drafted_and_not_persisted() {
    let source = Arc::new(StaticSource::new(vec![posting("B2", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 40, "reason": "weak match"}"#);

    let pipeline = build_pipeline(source, seen.clone(), llm.clone(), notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.scored, 1);
    assert_eq!(summary.below_threshold, 1);
    assert_eq!(summary.drafted, 0);
    assert_eq!(llm.call_count(), 1);
    assert!(notifier.delivered_ids().is_empty());
    // No skip decision was taken, so a later run may rescore it.
    assert_eq!(seen.count().await, 0);
}

#[tokio::test]
async fn delivery_failure_leaves_posting_unseen_and_next_run_retries() {
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());

    let source = Arc::new(StaticSource::new(vec![posting("A4", Some(100.0), true)]));
    let failing_notifier = Arc::new(RecordingNotifier::failing_for(&["A4"]));
    llm.push_text(r#"{"score": 90, "reason": "great match"}"#);
    llm.push_text("First attempt draft.");

    let pipeline = build_pipeline(
        source.clone(),
        seen.clone(),
        llm.clone(),
        failing_notifier.clone(),
        70,
    );
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 0);
    assert!(failing_notifier.delivered_ids().is_empty());
    assert_eq!(seen.count().await, 0, "failed delivery must not mark seen");

    // The next scheduled run re-evaluates the posting from scratch.
    let working_notifier = Arc::new(RecordingNotifier::new());
    llm.push_text(r#"{"score": 90, "reason": "great match"}"#);
    llm.push_text("Second attempt draft.");

    let pipeline = build_pipeline(source, seen.clone(), llm, working_notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.notified, 1);
    assert_eq!(working_notifier.delivered_ids(), vec!["A4".to_string()]);
    assert!(seen.get("A4").await.is_some());
}

#[tokio::test]
async fn second_run_never_notifies_twice() {
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let source = Arc::new(StaticSource::new(vec![posting("C1", Some(100.0), true)]));

    let first_notifier = Arc::new(RecordingNotifier::new());
    llm.push_text(r#"{"score": 95, "reason": "excellent"}"#);
    llm.push_text("Draft for the first run.");
    let pipeline = build_pipeline(
        source.clone(),
        seen.clone(),
        llm.clone(),
        first_notifier.clone(),
        70,
    );
    pipeline.run().await.unwrap();
    assert_eq!(first_notifier.delivered_ids(), vec!["C1".to_string()]);

    // Same store, same posting: the second run must skip it outright.
    let second_notifier = Arc::new(RecordingNotifier::new());
    llm.push_text(r#"{"score": 95, "reason": "excellent"}"#);
    llm.push_text("Draft that must never be requested.");
    let pipeline = build_pipeline(source, seen, llm.clone(), second_notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.skipped_seen, 1);
    assert!(second_notifier.delivered_ids().is_empty());
}

#[tokio::test]
async fn one_posting_failure_does_not_abort_the_batch() {
    let source = Arc::new(StaticSource::new(vec![
        posting("P1", Some(100.0), true),
        posting("P2", Some(100.0), true),
    ]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    // P1's score reply is garbage; P2 proceeds normally.
    llm.push_text("the model rambled instead of returning JSON");
    llm.push_text(r#"{"score": 88, "reason": "solid"}"#);
    llm.push_text("Draft for P2.");

    let pipeline = build_pipeline(source, seen.clone(), llm, notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(notifier.delivered_ids(), vec!["P2".to_string()]);
    assert!(seen.get("P1").await.is_none(), "P1 retries next run");
    assert!(seen.get("P2").await.is_some());
    assert_eq!(summary.failures.len(), 1);
}

#[tokio::test]
async fn empty_draft_fails_the_posting_without_notifying() {
    let source = Arc::new(StaticSource::new(vec![posting("D1", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 90, "reason": "great"}"#);
    llm.push_text("   \n  ");

    let pipeline = build_pipeline(source, seen.clone(), llm, notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(notifier.delivered_ids().is_empty());
    assert_eq!(seen.count().await, 0);
}

#[tokio::test]
async fn store_read_failure_skips_only_that_posting() {
    let source = Arc::new(StaticSource::new(vec![
        posting("E1", Some(100.0), true),
        posting("E2", Some(100.0), true),
    ]));
    let seen = Arc::new(FlakySeenStore::failing_reads_for(&["E1"]));
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 80, "reason": "good"}"#);
    llm.push_text("Draft for E2.");

    let pipeline = build_pipeline(source, seen.clone(), llm, notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(notifier.delivered_ids(), vec!["E2".to_string()]);
    assert!(!seen.contains("E1").await);
    assert!(seen.contains("E2").await);
}

#[tokio::test]
async fn source_failure_aborts_the_run() {
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let pipeline = build_pipeline(
        Arc::new(FailingSource),
        seen,
        llm.clone(),
        notifier.clone(),
        70,
    );
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, ScoutError::SourceUnavailable(_)));
    assert_eq!(llm.call_count(), 0);
    assert_eq!(notifier.summary_count(), 0);
}

#[tokio::test]
async fn quiet_run_delivers_a_summary_instead() {
    // Everything filtered out: no alert, but the summary goes out.
    let source = Arc::new(StaticSource::new(vec![
        posting("F1", Some(10.0), true),
        posting("F2", None, true),
    ]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let pipeline = build_pipeline(source, seen, llm, notifier.clone(), 70);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.filtered_out, 2);
    assert_eq!(summary.notified, 0);
    assert_eq!(notifier.summary_count(), 1);
    assert!(notifier.delivered_ids().is_empty());
}

#[tokio::test]
async fn notified_run_skips_the_summary_message() {
    let source = Arc::new(StaticSource::new(vec![posting("G1", Some(100.0), true)]));
    let seen = Arc::new(MemorySeenStore::new());
    let llm = Arc::new(MockInferenceClient::new());
    let notifier = Arc::new(RecordingNotifier::new());

    llm.push_text(r#"{"score": 99, "reason": "ideal"}"#);
    llm.push_text("Draft for G1.");

    let pipeline = build_pipeline(source, seen, llm, notifier.clone(), 70);
    pipeline.run().await.unwrap();

    assert_eq!(notifier.summary_count(), 0);
}
