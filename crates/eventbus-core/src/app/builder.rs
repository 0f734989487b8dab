//! BusBuilder - Bus の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect::<M>()` で handler が必須の message type を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば `BuildError::MissingHandlers` を返す

use std::future::Future;

use super::bus::Bus;
use crate::config::{BusConfig, ConfigError};
use crate::domain::{HandlerError, MessageTypeKey, RegisterError};
use crate::typed::{Handler, Message, Registry};

/// # 使用例
/// ```ignore
/// let bus = BusBuilder::new()
///     .config(BusConfig::with_capacity(16))
///     .register::<Event, _>(PrintHandler)?
///     .register_fn(audit)?
///     .expect::<Event>()
///     .build()?;
/// ```
pub struct BusBuilder {
    config: BusConfig,
    registry: Registry,
    expected: Vec<MessageTypeKey>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing handlers for message types: {0:?}. These types were expected but have no handler.")]
    MissingHandlers(Vec<String>),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BusBuilder {
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
            registry: Registry::new(),
            expected: Vec::new(),
        }
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register<M: Message, H: Handler<M>>(self, handler: H) -> Result<Self, RegisterError> {
        self.registry.register::<M, H>(handler)?;
        Ok(self)
    }

    pub fn register_fn<M, F, Fut>(self, f: F) -> Result<Self, RegisterError>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.register_fn(f)?;
        Ok(self)
    }

    /// `M` に handler が無ければ `build()` を失敗させる
    pub fn expect<M: Message>(mut self) -> Self {
        let key = MessageTypeKey::of::<M>();
        if !self.expected.contains(&key) {
            self.expected.push(key);
        }
        self
    }

    /// 設定と期待集合を検証し、dispatch loop を起動する
    ///
    /// tokio runtime の中で呼んでください。
    pub fn build(self) -> Result<Bus, BuildError> {
        self.config.validate()?;

        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|key| self.registry.lookup(key).is_empty())
            .map(|key| key.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingHandlers(missing));
        }

        Ok(Bus::start(self.config, self.registry))
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
