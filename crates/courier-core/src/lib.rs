//! courier-core
//!
//! SQS 風キューの上に載せる信頼性レイヤー。
//!
//! # モジュール構成
//! - **domain**: メッセージ、封筒（`{"msg": ...}`）、ack の状態
//! - **ports**: Transport trait（send / receive / delete）
//! - **runtime**: MessageHandler と Method 名での振り分け
//! - **queue**: 送信、再送台帳、then 継続、ack 監督、listen ループ
//! - **listener**: listen ループを別タスクで回すハンドル
//! - **impls**: InMemoryTransport（開発用）
//! - **config / observability**: 設定の読み込みと tracing

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod listener;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::QueueConfig;
pub use crate::domain::{Message, MessageId, Payload};
pub use crate::error::{CourierError, HandlerError, TransportError};
pub use crate::impls::InMemoryTransport;
pub use crate::listener::Listener;
pub use crate::observability::{QueueStats, init_tracing};
pub use crate::ports::Transport;
pub use crate::queue::{Pending, Queue};
pub use crate::runtime::MessageHandler;
