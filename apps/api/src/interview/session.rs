//! Interview flows: question plans, interviewer turns, and feedback.
//!
//! Flow per call: validate → build prompt → ChatBackend → post-process.
//! No interview state lives on the server; every call carries the setup
//! and the full transcript.

use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::models::{
    Feedback, InterviewSetup, QuestionSet, QuestionsPayload, TranscriptRequest,
};
use crate::interview::prompts::{
    render_transcript, FEEDBACK_PROMPT_TEMPLATE, QUESTIONS_PROMPT_TEMPLATE, REPLY_PROMPT_TEMPLATE,
};
use crate::llm_client::prompts::{fill_template, JSON_ONLY_INSTRUCTION, ROLE_PLAY_INSTRUCTION};
use crate::llm_client::{ask_json, ChatBackend, DeltaStream};

/// Generates the question plan for a new interview.
pub async fn generate_questions(
    chat: &dyn ChatBackend,
    setup: &InterviewSetup,
) -> Result<QuestionSet, AppError> {
    setup.validate()?;

    let prompt = build_questions_prompt(setup);
    let payload: QuestionsPayload = ask_json(chat, &prompt).await?;

    let mut questions: Vec<String> = payload
        .into_questions()
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if questions.is_empty() {
        return Err(AppError::Generation(
            "model returned no interview questions".to_string(),
        ));
    }

    let wanted = setup.question_count as usize;
    if questions.len() > wanted {
        warn!(
            "Model returned {} questions, truncating to {}",
            questions.len(),
            wanted
        );
        questions.truncate(wanted);
    }

    info!("Generated {} questions for role {:?}", questions.len(), setup.role);
    Ok(QuestionSet { questions })
}

/// Produces the interviewer's next turn as plain text.
pub async fn interviewer_reply(
    chat: &dyn ChatBackend,
    request: &TranscriptRequest,
) -> Result<String, AppError> {
    request.validate_for_reply()?;

    let answer = chat.ask(&build_reply_prompt(request)).await?;
    let reply = answer.trim();
    if reply.is_empty() {
        return Err(AppError::Generation(
            "interviewer reply had no content".to_string(),
        ));
    }
    Ok(reply.to_string())
}

/// Same as [`interviewer_reply`], but hands back the live delta stream.
pub async fn stream_interviewer_reply(
    chat: &dyn ChatBackend,
    request: &TranscriptRequest,
) -> Result<DeltaStream, AppError> {
    request.validate_for_reply()?;
    Ok(chat.ask_streaming(&build_reply_prompt(request)).await?)
}

/// Evaluates a finished (or abandoned) interview.
pub async fn generate_feedback(
    chat: &dyn ChatBackend,
    request: &TranscriptRequest,
) -> Result<Feedback, AppError> {
    request.validate_for_feedback()?;

    let feedback: Feedback = ask_json(chat, &build_feedback_prompt(request)).await?;
    let feedback = feedback.normalized();

    info!(
        "Feedback generated: score {}/100 for role {:?}",
        feedback.overall_score, request.setup.role
    );
    Ok(feedback)
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt builders
// ────────────────────────────────────────────────────────────────────────────

fn company_or_default(setup: &InterviewSetup) -> &str {
    setup
        .company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("an unnamed company")
}

fn tech_stack_or_default(setup: &InterviewSetup) -> String {
    if setup.tech_stack.is_empty() {
        "not specified".to_string()
    } else {
        setup.tech_stack.join(", ")
    }
}

fn build_questions_prompt(setup: &InterviewSetup) -> String {
    let question_count = setup.question_count.to_string();
    let tech_stack = tech_stack_or_default(setup);
    fill_template(
        QUESTIONS_PROMPT_TEMPLATE,
        &[
            ("interview_type", setup.interview_type.describe()),
            ("role", setup.role.trim()),
            ("company", company_or_default(setup)),
            ("experience_level", setup.experience_level.as_str()),
            ("tech_stack", tech_stack.as_str()),
            ("question_count", question_count.as_str()),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

fn build_reply_prompt(request: &TranscriptRequest) -> String {
    let setup = &request.setup;
    let question_count = setup.question_count.to_string();
    let questions_asked = request.questions_asked().to_string();
    let tech_stack = tech_stack_or_default(setup);
    let transcript = render_transcript(&request.transcript);
    fill_template(
        REPLY_PROMPT_TEMPLATE,
        &[
            ("role_play", ROLE_PLAY_INSTRUCTION),
            ("interview_type", setup.interview_type.describe()),
            ("role", setup.role.trim()),
            ("company", company_or_default(setup)),
            ("experience_level", setup.experience_level.as_str()),
            ("tech_stack", tech_stack.as_str()),
            ("question_count", question_count.as_str()),
            ("questions_asked", questions_asked.as_str()),
            ("transcript", transcript.as_str()),
        ],
    )
}

fn build_feedback_prompt(request: &TranscriptRequest) -> String {
    let setup = &request.setup;
    let transcript = render_transcript(&request.transcript);
    fill_template(
        FEEDBACK_PROMPT_TEMPLATE,
        &[
            ("interview_type", setup.interview_type.describe()),
            ("role", setup.role.trim()),
            ("experience_level", setup.experience_level.as_str()),
            ("transcript", transcript.as_str()),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}
