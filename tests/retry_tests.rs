mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use isobench::{
    partition, RetryController, RetryPolicy, StoreError, TransactionExecutor,
    TransactionIsolation, TransactionOutcome,
};

use common::{conflict, universe, ScriptedStore};

fn controller_for(store: &Arc<ScriptedStore>) -> RetryController {
    RetryController::new(TransactionExecutor::new(store.clone()))
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1)).unwrap()
}

#[test]
fn test_commit_on_first_attempt() {
    let store = Arc::new(ScriptedStore::new(vec![]));
    let chunks = partition(&universe(10), 10).unwrap();
    let chunk = &chunks[0];

    let report = controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy(3));

    assert_eq!(report.outcome, TransactionOutcome::Committed);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.accounts, universe(10));
    assert_eq!(store.executions(), 1);
}

#[test]
fn test_conflicts_are_retried_until_commit() {
    let store = Arc::new(ScriptedStore::new(vec![Err(conflict()), Err(conflict()), Ok(())]));
    let chunks = partition(&universe(4), 2).unwrap();
    let chunk = &chunks[1];

    let report = controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy(3));

    assert_eq!(report.outcome, TransactionOutcome::Committed);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.chunk_index, 1);
    assert_eq!(store.executions(), 3);
}

#[test]
fn test_retry_bound_holds_under_endless_conflicts() {
    let store = Arc::new(ScriptedStore::always_conflicting());
    let chunks = partition(&universe(10), 5).unwrap();
    let chunk = &chunks[0];

    let report = controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy(3));

    assert_eq!(report.outcome, TransactionOutcome::RetriesExhausted(conflict()));
    assert_eq!(report.attempts, 3);
    assert_eq!(store.executions(), 3);
}

#[test]
fn test_retry_bound_for_random_policies() {
    let mut rng = rand::rng();
    let chunks = partition(&universe(3), 3).unwrap();
    let chunk = &chunks[0];

    for _ in 0..20 {
        let max_attempts = rng.random_range(1..=6);
        let conflicts_before_commit = rng.random_range(0..=8);
        let script = (0..conflicts_before_commit)
            .map(|_| Err(conflict()))
            .chain(std::iter::once(Ok(())))
            .collect();
        let store = Arc::new(ScriptedStore::new(script));

        let report = controller_for(&store).run(
            chunk,
            TransactionIsolation::Serializable,
            &RetryPolicy::new(max_attempts, Duration::ZERO).unwrap(),
        );

        assert!(store.executions() <= max_attempts as usize);
        assert_eq!(store.executions(), report.attempts as usize);
        if conflicts_before_commit < max_attempts as usize {
            assert_eq!(report.outcome, TransactionOutcome::Committed);
        } else {
            assert!(matches!(report.outcome, TransactionOutcome::RetriesExhausted(_)));
        }
    }
}

#[test]
fn test_disabled_retry_makes_exactly_one_attempt() {
    let store = Arc::new(ScriptedStore::always_conflicting());
    let chunks = partition(&universe(10), 10).unwrap();
    let chunk = &chunks[0];
    let policy = RetryPolicy {
        enabled: false,
        max_attempts: 5,
        backoff_base: Duration::from_millis(1),
    };

    let report = controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy);

    assert!(matches!(report.outcome, TransactionOutcome::RetriesExhausted(_)));
    assert_eq!(report.attempts, 1);
    assert_eq!(store.executions(), 1);
}

#[test]
fn test_non_retryable_error_is_returned_immediately() {
    let failure = StoreError::Other("relation \"accounts\" does not exist".to_string());
    let store = Arc::new(ScriptedStore::new(vec![Err(failure.clone()), Ok(())]));
    let chunks = partition(&universe(10), 10).unwrap();
    let chunk = &chunks[0];

    let report = controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy(5));

    assert_eq!(report.outcome, TransactionOutcome::FailedNonRetryable(failure));
    assert_eq!(report.attempts, 1);
    assert_eq!(store.executions(), 1);
}

#[test]
fn test_backoff_is_linear_in_attempt_number() {
    let store = Arc::new(ScriptedStore::always_conflicting());
    let chunks = partition(&universe(2), 2).unwrap();
    let chunk = &chunks[0];
    let policy = RetryPolicy::new(3, Duration::from_millis(20)).unwrap();

    let start = Instant::now();
    controller_for(&store).run(chunk, TransactionIsolation::Serializable, &policy);
    let elapsed = start.elapsed();

    // 20ms after attempt 1, 40ms after attempt 2, nothing after the last one.
    assert!(elapsed >= Duration::from_millis(60), "elapsed {:?}", elapsed);
}
