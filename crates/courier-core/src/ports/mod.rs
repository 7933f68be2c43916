//! Ports - 外部システムへのインターフェース
//!
//! The only external collaborator of the core is the queue transport.

pub mod transport;

pub use self::transport::Transport;
