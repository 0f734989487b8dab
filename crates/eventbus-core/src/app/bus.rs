//! Bus - queue と dispatch loop を持つ公開 API
//!
//! # 使用例
//! ```ignore
//! let bus = Bus::new();
//! bus.register::<Event, _>(PrintHandler)?;
//! bus.send(Event { code: 0, msg: "hello".into() }).await?;
//! let report = bus.shutdown().await;
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::dispatch_loop::DispatchLoop;
use super::status::{BusStats, Counters, ShutdownReport};
use crate::config::BusConfig;
use crate::domain::{
    BusId, Envelope, HandlerError, HandlerFault, HandlerId, RegisterError, SendError,
};
use crate::typed::{DynHandler, Handler, Message, Registry};

/// 型でルーティングする in-process の publish/subscribe
///
/// Bus は自分の Registry と bounded queue を所有し、構築時に dispatch loop を
/// 一本 spawn します。複数の Bus は互いに独立です。
///
/// - `Bus` を drop すると dispatch loop は停止します（queue 内の message は drain 設定に従う）
/// - `shutdown()` で停止を待ち、`ShutdownReport` を受け取れます
pub struct Bus {
    id: BusId,
    registry: Arc<Registry>,
    queue: mpsc::Sender<Envelope>,
    shutdown_tx: watch::Sender<bool>,
    faults: broadcast::Sender<HandlerFault>,
    counters: Arc<Counters>,
    join: Mutex<Option<JoinHandle<ShutdownReport>>>,
}

impl Bus {
    /// デフォルト設定で Bus を起動する（tokio runtime 内で呼ぶこと）
    pub fn new() -> Self {
        Self::start(BusConfig::default(), Registry::new())
    }

    /// `config` は検証済みであること（`BusBuilder::build` が検証する）
    pub(crate) fn start(config: BusConfig, registry: Registry) -> Self {
        let id = BusId::generate();
        let registry = Arc::new(registry);
        let counters = Arc::new(Counters::default());
        let (queue_tx, queue_rx) = mpsc::channel(config.capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (faults, _) = broadcast::channel(config.fault_channel_capacity);

        tracing::info!(
            bus = %id,
            capacity = config.capacity,
            handlers = registry.len(),
            "bus started"
        );

        let dispatch = DispatchLoop::new(
            id,
            config,
            Arc::clone(&registry),
            queue_rx,
            shutdown_rx,
            faults.clone(),
            Arc::clone(&counters),
        );
        let span = tracing::info_span!("dispatch_loop", bus = %id);
        let join = tokio::spawn(dispatch.run().instrument(span));

        Self {
            id,
            registry,
            queue: queue_tx,
            shutdown_tx,
            faults,
            counters,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register<M: Message, H: Handler<M>>(
        &self,
        handler: H,
    ) -> Result<HandlerId, RegisterError> {
        self.registry.register::<M, H>(handler)
    }

    pub fn register_fn<M, F, Fut>(&self, f: F) -> Result<HandlerId, RegisterError>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.register_fn(f)
    }

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
        self.registry.register_fn_with_id(id, f)
    }

    pub fn register_dyn(&self, handler: Arc<dyn DynHandler>) -> Result<HandlerId, RegisterError> {
        self.registry.register_dyn(handler)
    }

    /// message を queue に入れる
    ///
    /// queue が満杯なら空きが出るまで待ちます（timeout なし）。
    /// handler が無い型でもエラーにはならず、dispatch 時に捨てられます。
    pub async fn send<M: Message>(&self, message: M) -> Result<(), SendError> {
        self.queue
            .send(Envelope::new(message))
            .await
            .map_err(|_| SendError::Closed)?;
        Counters::incr(&self.counters.sent);
        Ok(())
    }

    /// 待たずに queue に入れる。満杯なら `SendError::Full`
    pub fn try_send<M: Message>(&self, message: M) -> Result<(), SendError> {
        self.queue
            .try_send(Envelope::new(message))
            .map_err(|err| match err {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::Closed,
            })?;
        Counters::incr(&self.counters.sent);
        Ok(())
    }

    /// 同期コード用の `send`
    ///
    /// # Panics
    /// async context（tokio runtime のワーカー上）で呼ぶと panic します。
    /// `spawn_blocking` や別スレッドから使ってください。
    pub fn send_blocking<M: Message>(&self, message: M) -> Result<(), SendError> {
        self.queue
            .blocking_send(Envelope::new(message))
            .map_err(|_| SendError::Closed)?;
        Counters::incr(&self.counters.sent);
        Ok(())
    }

    /// handler の失敗を購読する
    ///
    /// 購読前に起きた fault は届きません。
    pub fn faults(&self) -> broadcast::Receiver<HandlerFault> {
        self.faults.subscribe()
    }

    pub fn stats(&self) -> BusStats {
        self.counters.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// 停止を要求する（待たない）
    pub fn request_shutdown(&self) {
        // dispatch loop がすでに終わっていれば receiver は無い
        let _ = self.shutdown_tx.send(true);
    }

    /// 停止を要求し、dispatch loop の終了を待つ
    ///
    /// 二回目以降の呼び出しは空の `ShutdownReport` を返します。
    pub async fn shutdown(&self) -> ShutdownReport {
        self.request_shutdown();

        let join = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(join) = join else {
            return ShutdownReport::default();
        };

        match join.await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(bus = %self.id, error = %err, "dispatch loop terminated abnormally");
                ShutdownReport::default()
            }
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
