//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **BusBuilder**: Bus の構築と起動時検証
//! - **Bus**: send / register の公開 API、queue の所有者
//! - **DispatchLoop**: queue を読み、handler へ fan-out する唯一の consumer
//! - **Status**: 観測用カウンタと shutdown の結果

pub mod builder;
pub mod bus;
mod dispatch_loop;
pub mod status;

pub use self::builder::{BuildError, BusBuilder};
pub use self::bus::Bus;
pub use self::status::{BusStats, ShutdownReport};
