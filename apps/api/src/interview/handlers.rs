//! Axum route handlers for the Interview API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures::{future, stream, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;

use crate::errors::AppError;
use crate::interview::models::{Feedback, InterviewSetup, QuestionSet, TranscriptRequest};
use crate::interview::session::{
    generate_feedback, generate_questions, interviewer_reply, stream_interviewer_reply,
};
use crate::llm_client::LlmError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub feedback: Feedback,
    pub generated_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interviews/questions
pub async fn handle_questions(
    State(state): State<AppState>,
    Json(setup): Json<InterviewSetup>,
) -> Result<Json<QuestionSet>, AppError> {
    let questions = generate_questions(state.chat.as_ref(), &setup).await?;
    Ok(Json(questions))
}

/// POST /api/v1/interviews/reply
///
/// Returns the interviewer's next turn once the whole answer has streamed in.
pub async fn handle_reply(
    State(state): State<AppState>,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<ReplyResponse>, AppError> {
    let reply = interviewer_reply(state.chat.as_ref(), &request).await?;
    Ok(Json(ReplyResponse { reply }))
}

/// POST /api/v1/interviews/reply/stream
///
/// Relays the interviewer's turn as server-sent events: one `delta` event per
/// fragment, then `done`. A failure mid-stream, or a stream that ends without
/// any text, ends with an `error` event carrying the error code instead.
/// Failures before the first byte are ordinary JSON errors.
pub async fn handle_reply_stream(
    State(state): State<AppState>,
    Json(request): Json<TranscriptRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let deltas = stream_interviewer_reply(state.chat.as_ref(), &request).await?;

    let events = deltas
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(RelayState::default(), |relay, item| {
            let event = match item {
                Some(Ok(delta)) if delta.is_empty() => Some(None),
                Some(Ok(delta)) => {
                    relay.relayed = true;
                    Some(Some(delta_event(&delta)))
                }
                Some(Err(e)) => {
                    relay.failed = true;
                    Some(Some(error_event(e)))
                }
                None if relay.failed => None,
                None if !relay.relayed => Some(Some(error_event(LlmError::EmptyContent))),
                None => Some(Some(Event::default().event("done").data("[DONE]"))),
            };
            future::ready(event)
        })
        .filter_map(future::ready)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Default)]
struct RelayState {
    relayed: bool,
    failed: bool,
}

/// POST /api/v1/interviews/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let feedback = generate_feedback(state.chat.as_ref(), &request).await?;
    Ok(Json(FeedbackResponse {
        feedback,
        generated_at: Utc::now(),
    }))
}

fn delta_event(delta: &str) -> Event {
    Event::default()
        .event("delta")
        .json_data(json!({ "delta": delta }))
        .unwrap_or_else(|_| Event::default().event("error").data("INTERNAL_ERROR"))
}

fn error_event(err: LlmError) -> Event {
    let err = AppError::from(err);
    Event::default()
        .event("error")
        .json_data(json!({ "code": err.code(), "message": err.public_message() }))
        .unwrap_or_else(|_| Event::default().event("error").data(err.code()))
}
