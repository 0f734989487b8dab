//! Handler trait - Message を受け取る Handler の定義
//!
//! # 二層構造
//! - ジェネリック trait (`Handler<M>`) と async fn (`FnHandler`) が表層
//! - Object-safe trait (`DynHandler`) が Registry 内部の表現
//! - Type erasure: `TypedHandler<M, H>` / `FnHandler<M, F>` → `Arc<dyn DynHandler>`

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use super::message::Message;
use crate::domain::{Envelope, HandlerError, HandlerId, MessageTypeKey};

/// Handler は一種類の Message を処理する
///
/// # 使用例
/// ```ignore
/// struct PrintHandler;
///
/// #[async_trait]
/// impl Handler<Event> for PrintHandler {
///     async fn handle(&self, event: Event) -> Result<(), HandlerError> {
///         println!("code={} msg={}", event.code, event.msg);
///         Ok(())
///     }
/// }
/// ```
///
/// `Handler<Event>` は `Event` しか受け取れないので、
/// 引数の数や型の検証はコンパイル時に済んでいます。
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: M) -> Result<(), HandlerError>;

    /// 二重登録の検出に使う ID。デフォルトは handler の型名
    fn id(&self) -> HandlerId {
        HandlerId::of::<Self>()
    }
}

/// Handler が受け取るパラメータの宣言
///
/// Registry はこれを見て arity を検証し、routing key を決めます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSignature {
    params: Vec<MessageTypeKey>,
}

impl HandlerSignature {
    pub fn new(params: Vec<MessageTypeKey>) -> Self {
        Self { params }
    }

    /// `M` を一つだけ受け取る signature
    pub fn unary<M: Message>() -> Self {
        Self::new(vec![MessageTypeKey::of::<M>()])
    }

    pub fn params(&self) -> &[MessageTypeKey] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// DynHandler は object-safe な Handler の抽象化
///
/// `HashMap<HandlerId, Arc<dyn DynHandler>>` に格納するための形です。
/// 自前で実装する場合（スクリプト連携など）は `signature()` が
/// Registry の実行時検証にかかります。
#[async_trait]
pub trait DynHandler: Send + Sync {
    fn id(&self) -> HandlerId;

    /// `None` は呼び出し不可能（NotCallable）
    fn signature(&self) -> Option<HandlerSignature>;

    async fn handle_dyn(&self, envelope: Envelope) -> Result<(), HandlerError>;
}

pub struct TypedHandler<M, H> {
    handler: H,
    _marker: PhantomData<fn(M)>,
}

impl<M: Message, H: Handler<M>> TypedHandler<M, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message, H: Handler<M>> DynHandler for TypedHandler<M, H> {
    fn id(&self) -> HandlerId {
        self.handler.id()
    }

    fn signature(&self) -> Option<HandlerSignature> {
        Some(HandlerSignature::unary::<M>())
    }

    async fn handle_dyn(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let message = envelope
            .downcast::<M>()
            .ok_or_else(|| HandlerError::payload_mismatch(MessageTypeKey::of::<M>(), envelope.key()))?;
        self.handler.handle(message).await
    }
}

/// async fn / closure を Handler として包む
pub struct FnHandler<M, F> {
    id: HandlerId,
    f: F,
    _marker: PhantomData<fn(M)>,
}

impl<M, F, Fut> FnHandler<M, F>
where
    M: Message,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    pub fn new(id: HandlerId, f: F) -> Self {
        Self {
            id,
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F, Fut> DynHandler for FnHandler<M, F>
where
    M: Message,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn id(&self) -> HandlerId {
        self.id.clone()
    }

    fn signature(&self) -> Option<HandlerSignature> {
        Some(HandlerSignature::unary::<M>())
    }

    async fn handle_dyn(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let message = envelope
            .downcast::<M>()
            .ok_or_else(|| HandlerError::payload_mismatch(MessageTypeKey::of::<M>(), envelope.key()))?;
        (self.f)(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Debug, Clone)]
    struct Event {
        code: i32,
    }

    struct SumHandler {
        total: Arc<AtomicI32>,
    }

    #[async_trait]
    impl Handler<Event> for SumHandler {
        async fn handle(&self, event: Event) -> Result<(), HandlerError> {
            self.total.fetch_add(event.code, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_envelope() {
        let total = Arc::new(AtomicI32::new(0));
        let typed = TypedHandler::<Event, _>::new(SumHandler {
            total: total.clone(),
        });

        typed.handle_dyn(Envelope::new(Event { code: 5 })).await.unwrap();
        typed.handle_dyn(Envelope::new(Event { code: 2 })).await.unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 7);
        assert_eq!(typed.signature(), Some(HandlerSignature::unary::<Event>()));
        assert!(typed.id().as_str().ends_with("SumHandler"));
    }

    #[tokio::test]
    async fn typed_handler_rejects_foreign_payload() {
        let typed = TypedHandler::<Event, _>::new(SumHandler {
            total: Arc::new(AtomicI32::new(0)),
        });

        let err = typed.handle_dyn(Envelope::new(1_u64)).await.unwrap_err();
        assert!(err.message().contains("u64"));
    }

    #[tokio::test]
    async fn fn_handler_keeps_explicit_id() {
        let handler = FnHandler::new(HandlerId::from("negative"), |event: Event| async move {
            if event.code < 0 {
                return Err(HandlerError::new("negative code"));
            }
            Ok(())
        });

        assert_eq!(handler.id(), HandlerId::from("negative"));
        assert!(handler.handle_dyn(Envelope::new(Event { code: 1 })).await.is_ok());
        let err = handler
            .handle_dyn(Envelope::new(Event { code: -1 }))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "negative code");
    }
}
