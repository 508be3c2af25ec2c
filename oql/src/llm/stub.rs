//! Deterministic scripted provider for tests.
//!
//! Responses are played back in the order they were pushed. With
//! `repeat_last` enabled the final response is replayed indefinitely, which
//! lets a test drive the composer's retry loop with an always-invalid
//! candidate and assert the attempt bound.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, LlmError, LlmProvider};

#[derive(Default)]
pub struct StubProvider {
    script: Mutex<VecDeque<ChatResponse>>,
    repeat_last: bool,
    calls: Mutex<u32>,
}

impl StubProvider {
    pub fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat_last: false,
            calls: Mutex::new(0),
        }
    }

    /// Keep replaying the last scripted response once the queue is down to
    /// one entry.
    pub fn with_repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Number of chat requests issued so far.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().expect("stub lock poisoned")
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
        *self.calls.lock().expect("stub lock poisoned") += 1;
        let mut script = self.script.lock().expect("stub lock poisoned");
        if self.repeat_last && script.len() == 1 {
            return Ok(script.front().cloned().expect("script not empty"));
        }
        script
            .pop_front()
            .ok_or_else(|| LlmError::Protocol("stub script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn responses_play_back_in_order() {
        let stub = StubProvider::new(vec![
            ChatResponse::answer(&json!({"first": true})),
            ChatResponse::answer(&json!({"second": true})),
        ]);
        let request = ChatRequest::new(vec![]);
        let first = stub.chat(request.clone()).await.unwrap();
        assert!(first.content.unwrap().contains("first"));
        let second = stub.chat(request.clone()).await.unwrap();
        assert!(second.content.unwrap().contains("second"));
        assert!(stub.chat(request).await.is_err());
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn repeat_last_replays_forever() {
        let stub = StubProvider::new(vec![ChatResponse::answer(&json!({"again": true}))])
            .with_repeat_last();
        let request = ChatRequest::new(vec![]);
        for _ in 0..5 {
            let response = stub.chat(request.clone()).await.unwrap();
            assert!(response.content.unwrap().contains("again"));
        }
        assert_eq!(stub.calls(), 5);
    }
}
