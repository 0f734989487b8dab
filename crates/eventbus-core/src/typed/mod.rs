//! Typed - 型付き Handler API
//!
//! routing key は message の型そのもの（`TypeId`）です。
//! 型名文字列の解析や実行時の arity 推測はしません。
//!
//! # 二層構造
//! - **表層（Typed）**: `Message`, `Handler<M>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod message;
pub mod registry;

pub use self::handler::{DynHandler, FnHandler, Handler, HandlerSignature, TypedHandler};
pub use self::message::Message;
pub use self::registry::{HandlerEntry, Registry};
