//! Scripted chat backend for exercising interview flows without an upstream.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::llm_client::{ChatBackend, DeltaStream, LlmError};

/// Replays canned answers in order and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedBackend {
    answers: Mutex<VecDeque<Result<String, LlmError>>>,
    deltas: Mutex<VecDeque<Vec<Result<String, LlmError>>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn answering(answers: Vec<Result<String, LlmError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Default::default()
        }
    }

    pub fn streaming(deltas: Vec<Result<String, LlmError>>) -> Self {
        Self {
            deltas: Mutex::new(VecDeque::from([deltas])),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }

    async fn ask_streaming(&self, prompt: &str) -> Result<DeltaStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let items = self.deltas.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(stream::iter(items)))
    }
}
