//! BusConfig - Bus の設定

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// handler が無い message を dispatch loop がどう扱うか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnroutedPolicy {
    /// 黙って捨てる
    #[default]
    Drop,
    /// 捨てて `debug` ログを出す
    Log,
}

/// Bus の設定
///
/// 全フィールドにデフォルトがあるので、一部だけの JSON も受け付けます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// queue の容量。これだけ溜まると `send` は待つ
    pub capacity: usize,

    /// shutdown 要求時に queue に残っている message を dispatch するか
    pub drain_on_shutdown: bool,

    /// 実行中の handler を abort するまで shutdown が待つ時間
    pub shutdown_timeout_ms: u64,

    /// fault broadcast channel のバッファ。遅い購読者は古い fault を取りこぼす
    pub fault_channel_capacity: usize,

    pub unrouted: UnroutedPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bus config: {0}")]
    Invalid(String),

    #[error("failed to parse bus config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BusConfig {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// 容量 0 はどちらの channel も panic するので先に弾く
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "capacity must be greater than zero".into(),
            ));
        }
        if self.fault_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "fault_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            drain_on_shutdown: true,
            shutdown_timeout_ms: 5_000,
            fault_channel_capacity: 64,
            unrouted: UnroutedPolicy::Drop,
        }
    }
}
