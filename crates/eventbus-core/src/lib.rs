//! eventbus-core
//!
//! In-process, type-routed publish/subscribe.
//!
//! handler は message の型ごとに登録します。[`Bus`] に送った値は、その型に
//! 登録された全 handler へ非同期に配送されます。
//!
//! # モジュール構成
//! - **domain**: MessageTypeKey, HandlerId, Envelope, errors, HandlerFault
//! - **typed**: Message / Handler trait, DynHandler, Registry
//! - **app**: Bus, BusBuilder, dispatch loop, stats
//! - **config**: BusConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod typed;

pub use app::{BuildError, Bus, BusBuilder, BusStats, ShutdownReport};
pub use config::{BusConfig, ConfigError, UnroutedPolicy};
pub use domain::{
    BusId, FaultKind, HandlerError, HandlerFault, HandlerId, MessageTypeKey, RegisterError,
    SendError,
};
pub use typed::{DynHandler, Handler, HandlerSignature, Message, Registry};
