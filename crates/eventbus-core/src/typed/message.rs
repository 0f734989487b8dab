//! Message trait - bus に流せる値
//!
//! # Trait Bounds
//! - `Clone`: fan-out で handler ごとに値を渡すため
//! - `Send + Sync`: 複数 task から安全に使えるため
//! - `'static`: `TypeId` と `Arc<dyn Any>` に格納するため（参照を持たない）

/// 任意の `Clone + Send + Sync + 'static` 値は Message です。
///
/// routing key は型そのもの（`MessageTypeKey::of::<M>()`）なので、
/// 型ごとに名前を宣言する必要はありません。
pub trait Message: Clone + Send + Sync + 'static {}

impl<T> Message for T where T: Clone + Send + Sync + 'static {}
