//! Backoff policy: decides the delay attributes of outgoing messages.

use crate::domain::{Attributes, METHOD_ATTR, Message, NEXT_DELAY_RETRY_ATTR};
use crate::error::CourierError;

/// Fixed additive backoff.
///
/// Every send carries `NextDelayRetry = delay + step`; a resend is delayed by
/// the incoming `NextDelayRetry`, so the delay grows by `step` per failed
/// attempt. There is no cap: the retry ceiling bounds the number of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    step_seconds: u64,
}

/// A message ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub body: String,
    pub attributes: Attributes,
    pub delay_seconds: u64,
}

impl BackoffPolicy {
    pub fn new(step_seconds: u64) -> Self {
        Self { step_seconds }
    }

    /// `NextDelayRetry` value for a message sent with `delay_seconds`.
    pub fn next_delay(&self, delay_seconds: u64) -> u64 {
        delay_seconds.saturating_add(self.step_seconds)
    }

    /// Build an outgoing message. `Method` is only set for named handlers.
    pub fn outgoing(&self, method: &str, body: String, delay_seconds: u64) -> Outgoing {
        let mut attributes = Attributes::new();
        attributes.insert(
            NEXT_DELAY_RETRY_ATTR.to_string(),
            self.next_delay(delay_seconds).to_string(),
        );
        if !method.is_empty() {
            attributes.insert(METHOD_ATTR.to_string(), method.to_string());
        }
        Outgoing {
            body,
            attributes,
            delay_seconds,
        }
    }

    /// The copy to submit after a handler failed on `message`.
    ///
    /// Same body and method; delayed by the incoming `NextDelayRetry`.
    pub fn resend(&self, message: &Message) -> Result<Outgoing, CourierError> {
        let delay = message.next_delay_retry()?;
        Ok(self.outgoing(message.method(), message.body.clone(), delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn outgoing_sets_next_delay_and_omits_default_method() {
        let policy = BackoffPolicy::new(1);
        let out = policy.outgoing("", "body".into(), 0);

        assert_eq!(out.delay_seconds, 0);
        assert_eq!(out.attributes.get(NEXT_DELAY_RETRY_ATTR).unwrap(), "1");
        assert!(!out.attributes.contains_key(METHOD_ATTR));
    }

    #[rstest]
    #[case::first_failure(None, 3, 0, "3")]
    #[case::later_failure(Some("10"), 3, 10, "13")]
    #[case::unit_step(Some("4"), 1, 4, "5")]
    fn resend_increments_next_delay(
        #[case] incoming: Option<&str>,
        #[case] step: u64,
        #[case] expected_delay: u64,
        #[case] expected_next: &str,
    ) {
        let mut msg = Message::new("id", "receipt", "something to send");
        if let Some(incoming) = incoming {
            msg = msg.with_attribute(NEXT_DELAY_RETRY_ATTR, incoming);
        }

        let out = BackoffPolicy::new(step).resend(&msg).unwrap();
        assert_eq!(out.body, "something to send");
        assert_eq!(out.delay_seconds, expected_delay);
        assert_eq!(out.attributes.get(NEXT_DELAY_RETRY_ATTR).unwrap(), expected_next);
    }

    #[test]
    fn resend_preserves_method() {
        let msg = Message::new("id", "receipt", "b").with_attribute(METHOD_ATTR, "billing");
        let out = BackoffPolicy::new(1).resend(&msg).unwrap();
        assert_eq!(out.attributes.get(METHOD_ATTR).map(String::as_str), Some("billing"));
    }

    #[test]
    fn resend_rejects_malformed_delay() {
        let msg = Message::new("id", "receipt", "").with_attribute(NEXT_DELAY_RETRY_ATTR, "NaN");
        let err = BackoffPolicy::new(3).resend(&msg).unwrap_err();
        assert_eq!(err.to_string(), r#"incorrect value of NextDelayRetry: "NaN""#);
    }

    #[test]
    fn delays_never_decrease_along_a_chain() {
        let policy = BackoffPolicy::new(2);
        let mut msg = Message::new("id", "receipt", "b");
        let mut last = 0;
        for _ in 0..5 {
            let out = policy.resend(&msg).unwrap();
            assert!(out.delay_seconds >= last);
            last = out.delay_seconds;
            msg.attributes = out.attributes;
        }
        assert_eq!(last, 8);
    }
}
