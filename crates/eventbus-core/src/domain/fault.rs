//! HandlerFault - 失敗した handler 呼び出しの記録

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;

use super::ids::{BusId, HandlerId};
use super::key::MessageTypeKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// handler が `Err(HandlerError)` を返した
    Failed(String),
    /// handler が panic した
    Panicked(String),
}

/// 一つの handler 呼び出しの失敗
///
/// dispatch loop が回収して tracing に出し、`Bus::faults()` の購読者へ broadcast します。
/// 他の handler や dispatch loop 自体には影響しません。
#[derive(Debug, Clone)]
pub struct HandlerFault {
    pub bus: BusId,
    pub message_type: MessageTypeKey,
    pub handler: HandlerId,
    pub kind: FaultKind,
    pub occurred_at: DateTime<Utc>,
}

impl HandlerFault {
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, FaultKind::Panicked(_))
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::Failed(reason) => write!(
                f,
                "[{}] handler {} failed on {}: {}",
                self.bus, self.handler, self.message_type, reason
            ),
            FaultKind::Panicked(reason) => write!(
                f,
                "[{}] handler {} panicked on {}: {}",
                self.bus, self.handler, self.message_type, reason
            ),
        }
    }
}

/// panic payload を文字列にする
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
