use op_toolkit_engine::config::{EngineConfig, DOWNLOAD_CHUNK_SIZE};
use op_toolkit_engine::engine::retry::BackoffStrategy;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.scan_interval_ms, 5_000);
    assert_eq!(config.download_chunk_size, DOWNLOAD_CHUNK_SIZE);
    assert_eq!(config.connect_retry.strategy, BackoffStrategy::Exponential);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config: EngineConfig = serde_json::from_str(
        r#"{
            "max_connect_concurrency": 2,
            "connect_retry": { "max_retries": 5, "strategy": "linear" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.max_connect_concurrency, 2);
    assert_eq!(config.connect_retry.max_retries, 5);
    assert_eq!(config.connect_retry.strategy, BackoffStrategy::Linear);
    assert_eq!(config.connect_retry.base_delay_ms, 500);
    assert_eq!(config.discovery_timeout_ms, 10_000);
}

#[test]
fn test_normalized_clamps_zero_values() {
    let config = EngineConfig {
        max_connect_concurrency: 0,
        download_chunk_size: 0,
        ..EngineConfig::default()
    }
    .normalized();
    assert_eq!(config.max_connect_concurrency, 1);
    assert_eq!(config.download_chunk_size, 1);
}
