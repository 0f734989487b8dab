//! Errors - registration / send / handler のエラー型
//!
//! dispatch 側にはエラーチャネルがありません。handler の失敗は
//! `HandlerFault` として fault channel に流れます（`domain::fault`）。

use thiserror::Error;

use super::ids::HandlerId;
use super::key::MessageTypeKey;

/// Registry への登録エラー
///
/// 検証順: NotCallable → ZeroArity → TooManyParameters → DuplicateHandler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("handler is not callable")]
    NotCallable,

    #[error("handler takes no parameters, expected exactly one")]
    ZeroArity,

    #[error("handler takes {count} parameters, expected exactly one")]
    TooManyParameters { count: usize },

    #[error("duplicate handler {handler} for message type {message_type}")]
    DuplicateHandler {
        message_type: MessageTypeKey,
        handler: HandlerId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// Bus はすでに shutdown 済み
    #[error("bus is closed")]
    Closed,

    /// `try_send` で queue が満杯
    #[error("bus queue is full")]
    Full,
}

/// Handler が返すエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn payload_mismatch(expected: MessageTypeKey, actual: MessageTypeKey) -> Self {
        Self::new(format!("payload is {actual}, handler expects {expected}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
