//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTransport**: プロセス内で完結する Transport
//!
//! 本番用の SQS 実装は別クレートで Transport を実装する想定。

pub mod inmem_transport;

pub use self::inmem_transport::InMemoryTransport;
