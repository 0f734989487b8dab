//! Registry - Handler の登録と管理
//!
//! # 内部実装
//! - `HashMap<MessageTypeKey, HashMap<HandlerId, HandlerEntry>>` の二段構造
//! - 一つの `Mutex` を登録と dispatch 時の lookup で共有する
//! - エントリは削除しない（Registry と同じ寿命で単調に増える）

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::handler::{DynHandler, FnHandler, Handler, TypedHandler};
use super::message::Message;
use crate::domain::{HandlerError, HandlerId, MessageTypeKey, RegisterError};

/// 登録済みの handler 一件
#[derive(Clone)]
pub struct HandlerEntry {
    id: HandlerId,
    handler: Arc<dyn DynHandler>,
}

impl HandlerEntry {
    pub fn id(&self) -> &HandlerId {
        &self.id
    }

    pub fn handler(&self) -> &Arc<dyn DynHandler> {
        &self.handler
    }
}

type HandlerSet = HashMap<HandlerId, HandlerEntry>;

/// Registry は message type ごとに handler の集合を持つ
///
/// # 使用例
/// ```ignore
/// let registry = Registry::new();
/// registry.register::<Event, _>(PrintHandler)?;
/// registry.register_fn(audit)?;
/// registry.register_fn_with_id("recorder", |e: Event| async move { Ok(()) })?;
/// ```
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<MessageTypeKey, HandlerSet>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Handler<M>` 実装を登録する。ID は `handler.id()`
    pub fn register<M: Message, H: Handler<M>>(
        &self,
        handler: H,
    ) -> Result<HandlerId, RegisterError> {
        self.register_dyn(Arc::new(TypedHandler::new(handler)))
    }

    /// async fn / closure を登録する。ID は `F` の型（表示名は `fn` item ならそのパス）
    pub fn register_fn<M, F, Fut>(&self, f: F) -> Result<HandlerId, RegisterError>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register_fn_with_id(HandlerId::of::<F>(), f)
    }

    /// 文字列の ID で登録する（ログ上の名前を固定したいとき）
    pub fn register_fn_with_id<M, F, Fut>(
        &self,
        id: impl Into<HandlerId>,
        f: F,
    ) -> Result<HandlerId, RegisterError>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register_dyn(Arc::new(FnHandler::new(id.into(), f)))
    }

    /// 型消去済みの handler を登録する
    ///
    /// すべての登録経路はここを通ります。
    pub fn register_dyn(&self, handler: Arc<dyn DynHandler>) -> Result<HandlerId, RegisterError> {
        let id = handler.id();
        let key = match handler.signature() {
            None => {
                tracing::warn!(handler = %id, "handler rejected: not callable");
                return Err(RegisterError::NotCallable);
            }
            Some(signature) => match signature.params() {
                [] => {
                    tracing::warn!(handler = %id, "handler rejected: takes no parameters");
                    return Err(RegisterError::ZeroArity);
                }
                [key] => *key,
                params => {
                    tracing::warn!(
                        handler = %id,
                        count = params.len(),
                        "handler rejected: too many parameters"
                    );
                    return Err(RegisterError::TooManyParameters {
                        count: params.len(),
                    });
                }
            },
        };

        let mut entries = self.lock();
        match entries.entry(key).or_default().entry(id.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!(message_type = %key, handler = %id, "duplicate handler rejected");
                Err(RegisterError::DuplicateHandler {
                    message_type: key,
                    handler: id,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(HandlerEntry {
                    id: id.clone(),
                    handler,
                });
                tracing::info!(message_type = %key, handler = %id, "handler registered");
                Ok(id)
            }
        }
    }

    /// key に登録された handler のスナップショット
    ///
    /// ロックはコピーの間だけ保持し、handler 実行中は保持しません。
    pub fn lookup(&self, key: &MessageTypeKey) -> Vec<HandlerEntry> {
        self.lock()
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains<M: Message>(&self) -> bool {
        self.handler_count::<M>() > 0
    }

    pub fn handler_count<M: Message>(&self) -> usize {
        self.lock()
            .get(&MessageTypeKey::of::<M>())
            .map_or(0, HashMap::len)
    }

    /// handler が一つ以上ある message type
    pub fn registered_types(&self) -> Vec<MessageTypeKey> {
        self.lock()
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    /// 全 message type の handler 総数
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 書き込みは単一の insert だけなので、poison されても中身は一貫している
    fn lock(&self) -> MutexGuard<'_, HashMap<MessageTypeKey, HandlerSet>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Envelope;
    use crate::typed::handler::HandlerSignature;
    use async_trait::async_trait;
    use rstest::rstest;

    #[derive(Debug, Clone)]
    struct Event {
        code: i32,
    }

    #[derive(Debug, Clone)]
    struct OtherEvent;

    struct PrintHandler;

    #[async_trait]
    impl Handler<Event> for PrintHandler {
        async fn handle(&self, _event: Event) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Handler<OtherEvent> for PrintHandler {
        async fn handle(&self, _event: OtherEvent) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    async fn audit(event: Event) -> Result<(), HandlerError> {
        if event.code < 0 {
            return Err(HandlerError::new("negative"));
        }
        Ok(())
    }

    /// signature を自由に宣言できる DynHandler
    struct Declared(Option<HandlerSignature>);

    #[async_trait]
    impl DynHandler for Declared {
        fn id(&self) -> HandlerId {
            HandlerId::from("declared")
        }

        fn signature(&self) -> Option<HandlerSignature> {
            self.0.clone()
        }

        async fn handle_dyn(&self, _envelope: Envelope) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn register_then_lookup() {
        let registry = Registry::new();
        let id = registry.register::<Event, _>(PrintHandler).unwrap();

        let found = registry.lookup(&MessageTypeKey::of::<Event>());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), &id);
        assert!(registry.contains::<Event>());
        assert!(!registry.contains::<OtherEvent>());
    }

    #[test]
    fn duplicate_registration_is_rejected_and_registry_unchanged() {
        let registry = Registry::new();
        registry.register::<Event, _>(PrintHandler).unwrap();

        let err = registry.register::<Event, _>(PrintHandler).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::DuplicateHandler { message_type, .. }
                if message_type == MessageTypeKey::of::<Event>()
        ));
        assert_eq!(registry.handler_count::<Event>(), 1);
    }

    #[test]
    fn same_handler_for_different_types_is_not_a_duplicate() {
        let registry = Registry::new();
        registry.register::<Event, _>(PrintHandler).unwrap();
        registry.register::<OtherEvent, _>(PrintHandler).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.registered_types().len(), 2);
    }

    #[test]
    fn fn_items_are_identified_by_path() {
        let registry = Registry::new();
        let id = registry.register_fn(audit).unwrap();
        assert!(id.as_str().ends_with("registry::tests::audit"));

        assert!(matches!(
            registry.register_fn(audit),
            Err(RegisterError::DuplicateHandler { .. })
        ));
    }

    #[test]
    fn distinct_closures_register_without_explicit_ids() {
        let registry = Registry::new();
        let first = registry.register_fn(|_: Event| async { Ok(()) }).unwrap();
        let second = registry
            .register_fn(|event: Event| async move {
                if event.code < 0 {
                    return Err(HandlerError::new("negative"));
                }
                Ok(())
            })
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.handler_count::<Event>(), 2);
    }

    #[test]
    fn closures_with_distinct_ids_coexist() {
        let registry = Registry::new();
        registry
            .register_fn_with_id("first", |_: Event| async { Ok(()) })
            .unwrap();
        registry
            .register_fn_with_id("second", |_: Event| async { Ok(()) })
            .unwrap();
        registry.register::<Event, _>(PrintHandler).unwrap();

        assert_eq!(registry.handler_count::<Event>(), 3);
    }

    #[rstest]
    #[case::not_callable(None, RegisterError::NotCallable)]
    #[case::zero_arity(Some(HandlerSignature::new(vec![])), RegisterError::ZeroArity)]
    #[case::two_params(
        Some(HandlerSignature::new(vec![MessageTypeKey::of::<Event>(), MessageTypeKey::of::<OtherEvent>()])),
        RegisterError::TooManyParameters { count: 2 }
    )]
    #[case::three_params(
        Some(HandlerSignature::new(vec![MessageTypeKey::of::<Event>(); 3])),
        RegisterError::TooManyParameters { count: 3 }
    )]
    fn invalid_signatures_are_rejected(
        #[case] signature: Option<HandlerSignature>,
        #[case] expected: RegisterError,
    ) {
        let registry = Registry::new();
        let err = registry.register_dyn(Arc::new(Declared(signature))).unwrap_err();
        assert_eq!(err, expected);
        assert!(registry.is_empty());
        assert!(registry.registered_types().is_empty());
    }

    #[test]
    fn unary_dyn_handler_is_routed_by_its_parameter() {
        let registry = Registry::new();
        registry
            .register_dyn(Arc::new(Declared(Some(HandlerSignature::unary::<OtherEvent>()))))
            .unwrap();

        assert!(registry.contains::<OtherEvent>());
        assert!(!registry.contains::<Event>());
    }
}
