//! Mock backend for deterministic testing.
//!
//! Replies are queued and consumed in order. An empty queue is an error
//! (to catch test configuration mistakes) unless a fallback reply is set,
//! which then serves every further call - handy for batch tests where all
//! elements expect the same shape.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::{BackendError, BackendRequest, BackendResponse, GenerativeBackend};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this response immediately
    Respond(BackendResponse),
    /// Return this response after a simulated thinking delay
    RespondAfter(BackendResponse, Duration),
    /// Fail with this error
    Fail(BackendError),
    /// Never resolve - the call parks forever (for cancellation tests)
    Stall,
}

/// Deterministic scripted backend.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<Option<MockReply>>,
    received: Mutex<Vec<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Backend that answers every call with the same instance.
    pub fn always_instance(instance: JsonValue) -> Self {
        let backend = Self::new();
        backend.set_fallback(MockReply::Respond(BackendResponse::instance(instance)));
        backend
    }

    /// Backend that stalls on every call.
    pub fn always_stall() -> Self {
        let backend = Self::new();
        backend.set_fallback(MockReply::Stall);
        backend
    }

    /// Queue a reply for the next call.
    pub fn queue(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queue a plain instance reply.
    pub fn queue_instance(&self, instance: JsonValue) {
        self.queue(MockReply::Respond(BackendResponse::instance(instance)));
    }

    /// Queue a failure reply.
    pub fn queue_error(&self, error: BackendError) {
        self.queue(MockReply::Fail(error));
    }

    /// Serve this reply whenever the queue is empty.
    pub fn set_fallback(&self, reply: MockReply) {
        *self.fallback.lock().unwrap() = Some(reply);
    }

    /// Requests received so far (for assertions).
    pub fn received(&self) -> Vec<BackendRequest> {
        self.received.lock().unwrap().clone()
    }

    /// Number of scripted replies still queued.
    pub fn replies_remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn next_reply(&self) -> Option<MockReply> {
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return Some(reply);
        }
        self.fallback.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transduce(
        &self,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError> {
        self.received.lock().unwrap().push(request);

        let reply = self.next_reply().ok_or_else(|| {
            BackendError::NotReady(
                "MockBackend: no replies queued - queue replies before calling".to_string(),
            )
        })?;

        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::RespondAfter(response, delay) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            MockReply::Fail(error) => Err(error),
            MockReply::Stall => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> BackendRequest {
        BackendRequest {
            source: json!({"content": "hi"}),
            source_schema: json!({"type": "object"}),
            target_schema: json!({"type": "object"}),
            instructions: "fill".to_string(),
            want_explanation: false,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_queued_replies_consumed_in_order() {
        let backend = MockBackend::new();
        backend.queue_instance(json!({"n": 1}));
        backend.queue_instance(json!({"n": 2}));

        let first = backend.transduce(request()).await.unwrap();
        let second = backend.transduce(request()).await.unwrap();
        assert_eq!(first.instance["n"], 1);
        assert_eq!(second.instance["n"], 2);
        assert_eq!(backend.replies_remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_is_an_error() {
        let backend = MockBackend::new();
        let err = backend.transduce(request()).await.unwrap_err();
        assert!(matches!(err, BackendError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_fallback_serves_repeatedly() {
        let backend = MockBackend::always_instance(json!({"ok": true}));
        for _ in 0..3 {
            let response = backend.transduce(request()).await.unwrap();
            assert_eq!(response.instance["ok"], true);
        }
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let backend = MockBackend::always_instance(json!({}));
        backend.transduce(request()).await.unwrap();
        backend.transduce(request()).await.unwrap();

        let received = backend.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].instructions, "fill");
    }

    #[tokio::test]
    async fn test_queued_error_reply() {
        let backend = MockBackend::new();
        backend.queue_error(BackendError::Refused("nope".into()));
        let err = backend.transduce(request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Refused(_)));
    }

    #[tokio::test]
    async fn test_stall_never_resolves() {
        let backend = MockBackend::always_stall();
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            backend.transduce(request()),
        )
        .await;
        assert!(outcome.is_err(), "stalled call should not resolve");
    }
}
