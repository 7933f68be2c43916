//! Domain model (message, envelope, acknowledgment states).
//!
//! Transport に依存しない型だけを置く。

pub mod envelope;
pub mod message;
pub mod state;

pub use self::envelope::{Payload, decode, encode};
pub use self::message::{
    Attributes, METHOD_ATTR, Message, MessageId, NEXT_DELAY_RETRY_ATTR, ReceiptHandle,
};
pub use self::state::AckState;
