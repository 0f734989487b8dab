//! Envelope - queue の中を流れる型消去済みメッセージ

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::key::MessageTypeKey;
use crate::typed::Message;

/// Message + MessageTypeKey の“運搬用”データ。
///
/// key は send 時に payload の具象型から計算され、呼び出し側は指定しません。
/// payload は `Arc` なので fan-out 時の clone は参照カウントのみ。
#[derive(Clone)]
pub struct Envelope {
    key: MessageTypeKey,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub fn new<M: Message>(message: M) -> Self {
        Self {
            key: MessageTypeKey::of::<M>(),
            payload: Arc::new(message),
        }
    }

    pub fn key(&self) -> MessageTypeKey {
        self.key
    }

    /// payload が `M` なら clone して返す
    pub fn downcast<M: Message>(&self) -> Option<M> {
        self.payload.downcast_ref::<M>().cloned()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("key", &self.key).finish_non_exhaustive()
    }
}
