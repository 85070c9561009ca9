use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MIN_QUESTIONS: u8 = 1;
pub const MAX_QUESTIONS: u8 = 15;
const DEFAULT_QUESTIONS: u8 = 5;

/// Kind of interview being simulated. Drives question mix and feedback focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Technical,
    Behavioral,
    #[default]
    Mixed,
}

impl InterviewType {
    pub fn describe(self) -> &'static str {
        match self {
            InterviewType::Technical => {
                "technical (problem solving, system design, depth in the listed stack)"
            }
            InterviewType::Behavioral => {
                "behavioral (past situations, teamwork, conflict, ownership; STAR-style answers)"
            }
            InterviewType::Mixed => "mixed (roughly half technical, half behavioral)",
        }
    }
}

/// Everything the candidate filled in before the interview starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSetup {
    pub role: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default = "default_experience_level")]
    pub experience_level: String,
    #[serde(default)]
    pub interview_type: InterviewType,
    #[serde(default = "default_question_count")]
    pub question_count: u8,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

fn default_experience_level() -> String {
    "mid".to_string()
}

fn default_question_count() -> u8 {
    DEFAULT_QUESTIONS
}

impl InterviewSetup {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.role.trim().is_empty() {
            return Err(AppError::Validation("role cannot be empty".to_string()));
        }
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&self.question_count) {
            return Err(AppError::Validation(format!(
                "question_count must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One utterance in the interview, typed or transcribed from speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Request body shared by the reply and feedback endpoints. The client keeps
/// the transcript and sends it back in full with every call.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRequest {
    pub setup: InterviewSetup,
    pub transcript: Vec<Turn>,
}

impl TranscriptRequest {
    pub fn validate_for_reply(&self) -> Result<(), AppError> {
        self.setup.validate()?;
        match self.transcript.last() {
            Some(turn) if turn.speaker == Speaker::Candidate && turn.text.trim().is_empty() => Err(
                AppError::Validation("the last candidate answer cannot be empty".to_string()),
            ),
            Some(turn) if turn.speaker == Speaker::Candidate => Ok(()),
            Some(_) => Err(AppError::Validation(
                "transcript must end with a candidate turn".to_string(),
            )),
            None => Err(AppError::Validation("transcript cannot be empty".to_string())),
        }
    }

    pub fn validate_for_feedback(&self) -> Result<(), AppError> {
        self.setup.validate()?;
        if !self
            .transcript
            .iter()
            .any(|t| t.speaker == Speaker::Candidate && !t.text.trim().is_empty())
        {
            return Err(AppError::Validation(
                "transcript has no candidate answers to evaluate".to_string(),
            ));
        }
        Ok(())
    }

    pub fn questions_asked(&self) -> usize {
        self.transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Interviewer)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<String>,
}

/// Accepts both `{"questions": [...]}` and a bare array from the model.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuestionsPayload {
    Wrapped { questions: Vec<String> },
    Bare(Vec<String>),
}

impl QuestionsPayload {
    pub fn into_questions(self) -> Vec<String> {
        match self {
            QuestionsPayload::Wrapped { questions } | QuestionsPayload::Bare(questions) => {
                questions
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question: String,
    #[serde(default)]
    pub answer_summary: String,
    /// 1 – 5
    pub rating: u8,
    #[serde(default)]
    pub suggestion: String,
}

/// Post-interview evaluation produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// 0 – 100
    pub overall_score: u32,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub question_feedback: Vec<QuestionFeedback>,
}

impl Feedback {
    /// Clamps model-reported scores into their documented ranges.
    pub fn normalized(mut self) -> Self {
        self.overall_score = self.overall_score.min(100);
        for item in &mut self.question_feedback {
            item.rating = item.rating.clamp(1, 5);
        }
        self
    }
}
