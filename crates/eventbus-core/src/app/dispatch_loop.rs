//! DispatchLoop - queue を読んで handler へ fan-out するループ
//!
//! # フロー
//! 1. `recv()` で envelope を待つ（空のときは suspend、busy-poll しない）
//! 2. Registry から key に対応する handler のスナップショットを取得
//! 3. handler ごとに独立した task を JoinSet に spawn（完了は待たない）
//! 4. 完了した task を並行して回収し、Err / panic を HandlerFault として報告
//!
//! # 状態遷移
//! Running → (shutdown 要求 / Bus drop) → Draining → Stopped

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time;

use super::status::{Counters, ShutdownReport};
use crate::config::{BusConfig, UnroutedPolicy};
use crate::domain::fault::panic_message;
use crate::domain::{BusId, Envelope, FaultKind, HandlerError, HandlerFault, HandlerId, MessageTypeKey};
use crate::typed::Registry;

/// 実行中の handler 呼び出しが誰のものか
struct Invocation {
    message_type: MessageTypeKey,
    handler: HandlerId,
}

type Joined = Result<(task::Id, Result<(), HandlerError>), JoinError>;

pub(crate) struct DispatchLoop {
    bus: BusId,
    config: BusConfig,
    registry: Arc<Registry>,
    queue: mpsc::Receiver<Envelope>,
    shutdown_rx: watch::Receiver<bool>,
    faults: broadcast::Sender<HandlerFault>,
    counters: Arc<Counters>,
    in_flight: JoinSet<Result<(), HandlerError>>,
    invocations: HashMap<task::Id, Invocation>,
}

impl DispatchLoop {
    pub(crate) fn new(
        bus: BusId,
        config: BusConfig,
        registry: Arc<Registry>,
        queue: mpsc::Receiver<Envelope>,
        shutdown_rx: watch::Receiver<bool>,
        faults: broadcast::Sender<HandlerFault>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            bus,
            config,
            registry,
            queue,
            shutdown_rx,
            faults,
            counters,
            in_flight: JoinSet::new(),
            invocations: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self) -> ShutdownReport {
        tracing::debug!("dispatch loop started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    // sender の drop（Bus の drop）も停止要求として扱う
                    if changed.is_err() || *self.shutdown_rx.borrow_and_update() {
                        break;
                    }
                }
                Some(joined) = self.in_flight.join_next_with_id(), if !self.in_flight.is_empty() => {
                    self.reap(joined);
                }
                envelope = self.queue.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope),
                    None => break,
                },
            }
        }

        let report = self.stop().await;
        tracing::info!(
            drained = report.drained,
            discarded = report.discarded,
            aborted = report.aborted,
            "dispatch loop stopped"
        );
        report
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let key = envelope.key();
        let handlers = self.registry.lookup(&key);

        if handlers.is_empty() {
            Counters::incr(&self.counters.unrouted);
            if self.config.unrouted == UnroutedPolicy::Log {
                tracing::debug!(message_type = %key, "no handler registered, message dropped");
            }
            return;
        }

        Counters::incr(&self.counters.dispatched);
        for entry in handlers {
            let handler = Arc::clone(entry.handler());
            let envelope = envelope.clone();
            let abort = self
                .in_flight
                .spawn(async move { handler.handle_dyn(envelope).await });

            self.invocations.insert(
                abort.id(),
                Invocation {
                    message_type: key,
                    handler: entry.id().clone(),
                },
            );
            Counters::incr(&self.counters.invocations);
        }
    }

    fn reap(&mut self, joined: Joined) {
        let (task_id, kind) = match joined {
            Ok((task_id, Ok(()))) => {
                self.invocations.remove(&task_id);
                return;
            }
            Ok((task_id, Err(err))) => (task_id, FaultKind::Failed(err.to_string())),
            Err(err) if err.is_panic() => {
                let task_id = err.id();
                (task_id, FaultKind::Panicked(panic_message(err.into_panic())))
            }
            Err(err) => {
                // cancelled: abort_all() からのみ
                self.invocations.remove(&err.id());
                return;
            }
        };

        let Some(invocation) = self.invocations.remove(&task_id) else {
            return;
        };

        match &kind {
            FaultKind::Failed(reason) => {
                Counters::incr(&self.counters.failed);
                tracing::warn!(
                    message_type = %invocation.message_type,
                    handler = %invocation.handler,
                    %reason,
                    "handler failed"
                );
            }
            FaultKind::Panicked(reason) => {
                Counters::incr(&self.counters.panicked);
                tracing::error!(
                    message_type = %invocation.message_type,
                    handler = %invocation.handler,
                    %reason,
                    "handler panicked"
                );
            }
        }

        // 購読者がいなければ送信エラーになるが、fault は tracing に出ているので無視する
        let _ = self.faults.send(HandlerFault {
            bus: self.bus,
            message_type: invocation.message_type,
            handler: invocation.handler,
            kind,
            occurred_at: Utc::now(),
        });
    }

    /// queue を閉じて残りを drain し、実行中の handler を timeout まで待つ
    async fn stop(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        // 以降の send は SendError::Closed になる。待機中の send も起こされる
        self.queue.close();
        while let Some(envelope) = self.queue.recv().await {
            if self.config.drain_on_shutdown {
                self.dispatch(envelope);
                report.drained += 1;
            } else {
                report.discarded += 1;
            }
        }

        let deadline = time::sleep(self.config.shutdown_timeout());
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                joined = self.in_flight.join_next_with_id() => match joined {
                    Some(joined) => self.reap(joined),
                    None => break,
                },
                () = &mut deadline => {
                    report.aborted = self.in_flight.len() as u64;
                    tracing::warn!(
                        aborted = report.aborted,
                        "shutdown timeout elapsed, aborting in-flight handlers"
                    );
                    self.in_flight.abort_all();
                    while self.in_flight.join_next().await.is_some() {}
                    self.invocations.clear();
                    break;
                }
            }
        }

        report
    }
}
