/// LLM Client: the single point of entry for all upstream chat API calls.
///
/// ARCHITECTURAL RULE: No other module may call the upstream API directly.
/// All LLM interactions MUST go through this module.
///
/// Every answer is produced by the same three-step pipeline:
/// start a conversation → send the prompt into it → normalize the streamed reply.
/// A fresh conversation is opened per call; handles are never reused.
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::UpstreamConfig;

pub mod json_extract;
pub mod prompts;
pub mod stream;

pub use json_extract::parse_json_response;
pub use stream::StreamNormalizer;

/// First retry waits this long; each further retry doubles it.
const BACKOFF_BASE_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid upstream configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not start conversation (status {status:?}): {message}")]
    ConversationUnavailable { status: Option<u16>, message: String },

    #[error("Could not send message (status {status:?}): {message}")]
    MessageRejected { status: Option<u16>, message: String },

    #[error("Upstream stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Upstream did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM returned content that is not valid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Upstream-issued conversation identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct CreateConversationResponse {
    conversation: Option<ConversationBody>,
}

#[derive(Debug, Deserialize)]
struct ConversationBody {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    input: MessageInput<'a>,
}

#[derive(Debug, Serialize)]
struct MessageInput<'a> {
    message: &'a str,
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Live reply body of a dispatched message. At least one chunk has arrived;
/// the rest is still unread.
pub struct MessageStream {
    status: StatusCode,
    body: ByteStream,
}

impl MessageStream {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_body(self) -> impl Stream<Item = reqwest::Result<Bytes>> + Send {
        self.body
    }
}

/// Boxed delta stream handed to streaming callers.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// What interview flows need from a chat service.
/// Carried in `AppState` as `Arc<dyn ChatBackend>`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Runs one prompt to completion and returns the full answer text.
    async fn ask(&self, prompt: &str) -> Result<String, LlmError>;

    /// Opens the reply stream; deltas are yielded as they arrive.
    async fn ask_streaming(&self, prompt: &str) -> Result<DeltaStream, LlmError>;
}

/// Asks `chat` for an answer and parses it as JSON, recovering JSON wrapped
/// in prose or fences.
pub async fn ask_json<T: DeserializeOwned>(
    chat: &dyn ChatBackend,
    prompt: &str,
) -> Result<T, LlmError> {
    let answer = chat.ask(prompt).await?;
    parse_json_response(&answer)
}

/// How one send attempt failed, before it is attributed to a pipeline stage.
#[derive(Debug)]
enum SendFailure {
    Timeout,
    Transport(String),
    Status { status: u16, body: String },
}

impl SendFailure {
    fn is_transient(&self) -> bool {
        match self {
            SendFailure::Timeout | SendFailure::Transport(_) => true,
            SendFailure::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    StartConversation,
    SendMessage,
}

impl Stage {
    fn error(self, status: Option<u16>, message: String) -> LlmError {
        match self {
            Stage::StartConversation => LlmError::ConversationUnavailable { status, message },
            Stage::SendMessage => LlmError::MessageRejected { status, message },
        }
    }
}

/// The single upstream client used by all services.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: UpstreamConfig,
    shutdown: CancellationToken,
}

impl LlmClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig("API credential is empty".to_string()));
        }
        if config.project_id.trim().is_empty() {
            return Err(LlmError::InvalidConfig("project id is empty".to_string()));
        }

        // No overall client timeout: it would also cut off long-running reply streams.
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Every pipeline run observes a child of `token`, so cancelling it
    /// aborts all in-flight calls and open reply streams.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn conversations_url(&self) -> String {
        format!(
            "{}/projects/{}/conversations",
            self.config.base_url, self.config.project_id
        )
    }

    /// Opens a new conversation in the configured project.
    pub async fn start_conversation(&self) -> Result<ConversationHandle, LlmError> {
        let stage = Stage::StartConversation;
        let response = self
            .post_with_retry(&self.conversations_url(), &serde_json::json!({}), stage)
            .await?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| stage.error(Some(status), e.to_string()))?;

        let handle = serde_json::from_str::<CreateConversationResponse>(&body)
            .ok()
            .and_then(|r| r.conversation)
            .and_then(|c| c.id)
            .and_then(ConversationHandle::new);

        match handle {
            Some(handle) => {
                debug!("Conversation {} started", handle.as_str());
                Ok(handle)
            }
            None => {
                warn!("Conversation response carried no id: {}", body);
                Err(stage.error(
                    Some(status),
                    "response did not contain a conversation id".to_string(),
                ))
            }
        }
    }

    /// Sends `prompt` into `conversation` and returns the unread reply body.
    pub async fn send_message(
        &self,
        conversation: &ConversationHandle,
        prompt: &str,
    ) -> Result<MessageStream, LlmError> {
        let stage = Stage::SendMessage;
        let url = format!(
            "{}/{}/messages",
            self.conversations_url(),
            conversation.as_str()
        );
        let request = SendMessageRequest {
            input: MessageInput { message: prompt },
        };

        let response = self.post_with_retry(&url, &request, stage).await?;
        let status = response.status();
        let mut body = Box::pin(response.bytes_stream());

        // Wait for the first non-empty chunk so that an absent body (chunked
        // or not) is reported here rather than as an empty answer.
        let first = loop {
            match tokio::time::timeout(self.config.stream_timeout, body.next()).await {
                Err(_) => return Err(LlmError::Timeout(self.config.stream_timeout)),
                Ok(Some(Ok(chunk))) if chunk.is_empty() => continue,
                Ok(next) => break next,
            }
        };

        let Some(first) = first else {
            warn!("Message accepted with status {} but the body is empty", status);
            return Err(stage.error(Some(status.as_u16()), "reply body is empty".to_string()));
        };

        Ok(MessageStream {
            status,
            body: Box::pin(futures::stream::once(futures::future::ready(first)).chain(body)),
        })
    }

    /// Runs the full pipeline for one prompt and returns the finished answer.
    /// An answer with no recognizable events is an empty string, not an error.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete_with_cancellation(prompt, self.shutdown.child_token())
            .await
    }

    /// Like [`complete`](Self::complete), but aborts as soon as `token` fires,
    /// whichever stage the pipeline is in.
    pub async fn complete_with_cancellation(
        &self,
        prompt: &str,
        token: CancellationToken,
    ) -> Result<String, LlmError> {
        let run = self
            .run(prompt, token.clone())
            .instrument(info_span!("chat", request_id = %Uuid::new_v4()));

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(LlmError::Cancelled),
            result = run => result,
        }
    }

    async fn run(&self, prompt: &str, token: CancellationToken) -> Result<String, LlmError> {
        let conversation = self.start_conversation().await?;
        let message = self.send_message(&conversation, prompt).await?;
        debug!("Reply stream open (status {})", message.status());

        StreamNormalizer::new(self.config.stream_timeout)
            .with_cancellation(token)
            .collect(message.into_body())
            .await
    }

    /// Makes a POST with bearer auth, retrying transient failures with
    /// exponential backoff (1s, 2s, 4s, ...). Non-success statuses are logged
    /// with their raw body and attributed to `stage`.
    async fn post_with_retry<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        stage: Stage,
    ) -> Result<Response, LlmError> {
        let mut last_failure: Option<SendFailure> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1).min(6));
                warn!(
                    "{:?} attempt {} failed, retrying after {}ms...",
                    stage,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let request = self
                .client
                .post(url)
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send();

            let failure = match tokio::time::timeout(self.config.request_timeout, request).await {
                Err(_) => SendFailure::Timeout,
                Ok(Err(e)) if e.is_timeout() => SendFailure::Timeout,
                Ok(Err(e)) => SendFailure::Transport(e.to_string()),
                Ok(Ok(response)) if response.status().is_success() => return Ok(response),
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    warn!("{:?} returned {}: {}", stage, status, body);
                    SendFailure::Status { status, body }
                }
            };

            let transient = failure.is_transient();
            last_failure = Some(failure);
            if !transient {
                break;
            }
        }

        let failure =
            last_failure.unwrap_or_else(|| SendFailure::Transport("no attempt made".to_string()));
        Err(match failure {
            SendFailure::Timeout => LlmError::Timeout(self.config.request_timeout),
            SendFailure::Transport(message) => stage.error(None, message),
            SendFailure::Status { status, body } => stage.error(Some(status), body),
        })
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete(prompt).await
    }

    async fn ask_streaming(&self, prompt: &str) -> Result<DeltaStream, LlmError> {
        let span = info_span!("chat_stream", request_id = %Uuid::new_v4());
        let token = self.shutdown.child_token();
        let open = async {
            let conversation = self.start_conversation().await?;
            self.send_message(&conversation, prompt).await
        }
        .instrument(span);

        let message = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(LlmError::Cancelled),
            message = open => message?,
        };

        let normalizer =
            StreamNormalizer::new(self.config.stream_timeout).with_cancellation(token);
        Ok(Box::pin(normalizer.relay(message.into_body())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONVERSATIONS: &str = "/projects/proj-1/conversations";

    fn client_for(server: &MockServer) -> LlmClient {
        let config = UpstreamConfig::new(server.uri(), "proj-1", "test-key")
            .with_max_retries(0)
            .with_request_timeout(Duration::from_secs(5))
            .with_stream_timeout(Duration::from_secs(5));
        LlmClient::new(config).unwrap()
    }

    fn conversation_created(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "conversation": { "id": id } }))
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
    }

    async fn mount_conversation(server: &MockServer, id: &str) {
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(conversation_created(id))
            .mount(server)
            .await;
    }

    /// Serves one canned raw HTTP response per connection, in order.
    async fn raw_upstream(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        format!("http://{addr}")
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    #[test]
    fn test_conversation_handle_rejects_empty_id() {
        assert!(ConversationHandle::new("").is_none());
        assert!(ConversationHandle::new("   ").is_none());
        assert_eq!(ConversationHandle::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_new_rejects_empty_credential() {
        let config = UpstreamConfig::new("http://localhost", "proj", "");
        assert!(matches!(
            LlmClient::new(config),
            Err(LlmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_rejects_empty_project() {
        let config = UpstreamConfig::new("http://localhost", " ", "key");
        assert!(matches!(
            LlmClient::new(config),
            Err(LlmError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_start_conversation_sends_auth_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({})))
            .respond_with(conversation_created("abc123"))
            .expect(1)
            .mount(&server)
            .await;

        let handle = client_for(&server).start_conversation().await.unwrap();
        assert_eq!(handle.as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_start_conversation_without_id_is_conversation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "conversation": {} })))
            .mount(&server)
            .await;

        let err = client_for(&server).start_conversation().await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::ConversationUnavailable {
                status: Some(200),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_full_pipeline_concatenates_deltas() {
        let server = MockServer::start().await;
        mount_conversation(&server, "abc123").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/abc123/messages")))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({ "input": { "message": "Hello" } })))
            .respond_with(sse(
                "data: {\"delta\":\"Hi\"}\n\ndata: {\"delta\":\" there\"}\n\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client_for(&server).complete("Hello").await.unwrap();
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn test_failed_initiation_never_dispatches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/abc123/messages")))
            .respond_with(sse("data: {\"delta\":\"never\"}\n"))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).complete("Hello").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::ConversationUnavailable {
                status: Some(401),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_500_is_message_error_without_text() {
        let server = MockServer::start().await;
        mount_conversation(&server, "abc123").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/abc123/messages")))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).complete("Hello").await.unwrap_err();
        match err {
            LlmError::MessageRejected { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected MessageRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_empty_body_is_message_error() {
        let server = MockServer::start().await;
        mount_conversation(&server, "abc123").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/abc123/messages")))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("Hello").await.unwrap_err();
        assert!(matches!(err, LlmError::MessageRejected { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_empty_chunked_body_is_message_error() {
        let conversation = r#"{"conversation":{"id":"c1"}}"#;
        let base = raw_upstream(vec![
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                conversation.len(),
                conversation
            ),
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n0\r\n\r\n"
                .to_string(),
        ])
        .await;

        let config = UpstreamConfig::new(base, "proj-1", "test-key").with_max_retries(0);
        let err = LlmClient::new(config)
            .unwrap()
            .complete("Hello")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::MessageRejected {
                status: Some(200),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_conversation(&server, "retry-1").await;

        let config = UpstreamConfig::new(server.uri(), "proj-1", "test-key").with_max_retries(1);
        let handle = LlmClient::new(config)
            .unwrap()
            .start_conversation()
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "retry-1");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let config = UpstreamConfig::new(server.uri(), "proj-1", "test-key").with_max_retries(2);
        let err = LlmClient::new(config)
            .unwrap()
            .start_conversation()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::ConversationUnavailable {
                status: Some(403),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_slow_upstream_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONVERSATIONS))
            .respond_with(conversation_created("late").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = UpstreamConfig::new(server.uri(), "proj-1", "test-key")
            .with_max_retries(0)
            .with_request_timeout(Duration::from_millis(200));
        let err = LlmClient::new(config)
            .unwrap()
            .start_conversation()
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_pipeline_returns_cancelled() {
        let server = MockServer::start().await;
        mount_conversation(&server, "abc123").await;

        let token = CancellationToken::new();
        token.cancel();
        let err = client_for(&server)
            .complete_with_cancellation("Hello", token)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }

    #[tokio::test]
    async fn test_shutdown_token_cancels_complete() {
        let server = MockServer::start().await;
        mount_conversation(&server, "abc123").await;

        let shutdown = CancellationToken::new();
        let client = client_for(&server).with_shutdown(shutdown.clone());
        shutdown.cancel();

        let err = client.ask("Hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }

    #[tokio::test]
    async fn test_shutdown_token_ends_open_reply_stream() {
        let server = MockServer::start().await;
        mount_conversation(&server, "s2").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/s2/messages")))
            .respond_with(sse("data: {\"delta\":\"One\"}\n"))
            .mount(&server)
            .await;

        let shutdown = CancellationToken::new();
        let client = client_for(&server).with_shutdown(shutdown.clone());
        let mut deltas = client.ask_streaming("Count").await.unwrap();
        shutdown.cancel();

        assert!(matches!(deltas.next().await, Some(Err(LlmError::Cancelled))));
        assert!(deltas.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ask_streaming_relays_deltas_in_order() {
        let server = MockServer::start().await;
        mount_conversation(&server, "s1").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/s1/messages")))
            .respond_with(sse(
                ": keep-alive\ndata: {\"delta\":\"One\"}\ndata: {\"delta\":\", two\"}\n",
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let deltas: Vec<String> = client
            .ask_streaming("Count")
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(deltas, vec!["One".to_string(), ", two".to_string()]);
    }

    #[tokio::test]
    async fn test_fenced_json_answer_recovers_through_fallback() {
        let server = MockServer::start().await;
        mount_conversation(&server, "j1").await;
        Mock::given(method("POST"))
            .and(path(format!("{CONVERSATIONS}/j1/messages")))
            .respond_with(sse(
                "data: {\"delta\":\"```json\\n{\\\"a\\\"\"}\ndata: {\"delta\":\":1}\\n```\"}\n",
            ))
            .mount(&server)
            .await;

        let text = client_for(&server).complete("json please").await.unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_err());
        let value: serde_json::Value = parse_json_response(&text).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }
}
