//! Mock chat model for testing.
//!
//! Returns predetermined completions and records every prompt so tests can
//! assert on what was asked.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::ChatModel;

/// A single mock completion.
#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with this message.
    Error(String),
}

/// Mock model; clones share the reply script and prompt log.
#[derive(Debug, Clone)]
pub(crate) struct MockChatModel {
    /// Replies in order. Cycles if there are more calls than replies.
    replies: Arc<Vec<MockReply>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockChatModel {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(replies),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A model that always answers `text`.
    pub fn always(text: &str) -> Self {
        Self::new(vec![MockReply::Text(text.to_string())])
    }

    /// A model whose every call fails.
    pub fn always_fail(message: &str) -> Self {
        Self::new(vec![MockReply::Error(message.to_string())])
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let index = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };

        match &self.replies[index % self.replies.len()] {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Error(msg) => anyhow::bail!("{msg}"),
        }
    }

    fn description(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let model = MockChatModel::new(vec![
            MockReply::Text("first".to_string()),
            MockReply::Text("second".to_string()),
        ]);

        assert_eq!(model.generate("a").await.unwrap(), "first");
        assert_eq!(model.generate("b").await.unwrap(), "second");
        assert_eq!(model.generate("c").await.unwrap(), "first");
        assert_eq!(model.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mock_error() {
        let model = MockChatModel::always_fail("connection refused");
        let err = model.generate("x").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(model.call_count(), 1);
    }
}
