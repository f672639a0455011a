use std::io::Write;
use std::time::Duration;

use isobench::{
    BenchConfig, BenchError, ResetFailurePolicy, RetryPolicy, ScenarioConfig,
    TransactionIsolation,
};

#[test]
fn test_default_config_is_classic_benchmark() {
    let config = BenchConfig::default();
    config.validate().unwrap();

    assert_eq!(config.universe(), (1..=100).collect::<Vec<_>>());
    assert_eq!(config.k_values, vec![2, 10, 50, 100]);
    let scenarios: Vec<(TransactionIsolation, bool)> = config
        .scenarios
        .iter()
        .map(|s| (s.isolation, s.retry.enabled))
        .collect();
    assert_eq!(
        scenarios,
        vec![
            (TransactionIsolation::Serializable, true),
            (TransactionIsolation::Serializable, false),
            (TransactionIsolation::ReadCommitted, false),
        ]
    );
    assert_eq!(config.scenarios[0].retry.max_attempts, 3);
    assert_eq!(config.reset_failure, ResetFailurePolicy::Abort);
    assert_eq!(config.drain_grace, Duration::from_secs(30));
}

#[test]
fn test_partial_json_fills_defaults() {
    let config = BenchConfig::from_json_str(
        r#"{
            "accounts": 20,
            "scenarios": [
                {"isolation": "REPEATABLE_READ", "retry": {"max_attempts": 7}},
                {"isolation": "READ_COMMITTED"}
            ],
            "join_timeout_ms": 1500,
            "drain_grace_ms": 250,
            "reset_failure": "skip_k"
        }"#,
    )
    .unwrap();

    assert_eq!(config.universe().len(), 20);
    assert_eq!(config.k_values, vec![2, 10, 50, 100]);
    assert_eq!(
        config.scenarios[0],
        ScenarioConfig {
            isolation: TransactionIsolation::RepeatableRead,
            retry: RetryPolicy {
                max_attempts: 7,
                ..RetryPolicy::default()
            },
        }
    );
    assert_eq!(config.scenarios[1].retry, RetryPolicy::default());
    assert_eq!(config.join_timeout, Some(Duration::from_millis(1500)));
    assert_eq!(config.drain_grace, Duration::from_millis(250));
    assert_eq!(config.reset_failure, ResetFailurePolicy::SkipK);
}

#[test]
fn test_null_join_timeout_waits_forever() {
    let config = BenchConfig::from_json_str(r#"{"join_timeout_ms": null}"#).unwrap();
    assert_eq!(config.join_timeout, None);
}

#[test]
fn test_config_round_trips_through_file() {
    let config = BenchConfig {
        accounts: 10,
        k_values: vec![5, 1],
        ..BenchConfig::default()
    };
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
        .unwrap();

    let loaded = BenchConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BenchConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, BenchError::Io(_)));
}

#[test]
fn test_invalid_configs_are_rejected() {
    let zero_k = BenchConfig::from_json_str(r#"{"k_values": [10, 0]}"#).unwrap_err();
    assert!(matches!(zero_k, BenchError::InvalidChunkSize(0)));

    for json in [
        r#"{"accounts": 0}"#,
        r#"{"k_values": []}"#,
        r#"{"scenarios": []}"#,
        r#"{"scenarios": [{"isolation": "SERIALIZABLE", "retry": {"max_attempts": 0}}]}"#,
    ] {
        let err = BenchConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)), "{} gave {:?}", json, err);
    }
}

#[test]
fn test_unknown_isolation_level_is_rejected() {
    let err = BenchConfig::from_json_str(r#"{"scenarios": [{"isolation": "SNAPSHOT"}]}"#)
        .unwrap_err();
    assert!(matches!(err, BenchError::Json(_)));
}
