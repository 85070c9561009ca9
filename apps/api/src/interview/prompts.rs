// All LLM prompt constants for the Interview module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::interview::models::{Speaker, Turn};

/// Question generation prompt template.
/// Replace: {interview_type}, {role}, {company}, {experience_level},
///          {tech_stack}, {question_count}, {json_only}
pub const QUESTIONS_PROMPT_TEMPLATE: &str = r#"You are preparing a {interview_type} mock job interview.

CANDIDATE PROFILE:
- Target role: {role}
- Company: {company}
- Experience level: {experience_level}
- Tech stack: {tech_stack}

Write exactly {question_count} interview questions for this candidate.

Return a JSON object with this EXACT schema (no extra fields):
{
  "questions": [
    "Walk me through a system you designed end to end. What trade-offs did you make?"
  ]
}

Rules:
1. Order questions from warm-up to hardest
2. Match difficulty to the experience level
3. One question per entry, no numbering, no sub-questions
4. Questions must be answerable out loud in two to three minutes

{json_only}"#;

/// Interviewer reply prompt template (plain text answer).
/// Replace: {role_play}, {interview_type}, {role}, {company}, {experience_level},
///          {tech_stack}, {question_count}, {questions_asked}, {transcript}
pub const REPLY_PROMPT_TEMPLATE: &str = r#"{role_play}

You are conducting a {interview_type} interview for the role of {role} at {company}.
The candidate's experience level is {experience_level}. Relevant stack: {tech_stack}.

The interview has {question_count} questions in total; {questions_asked} have been asked so far.

TRANSCRIPT SO FAR:
{transcript}

Respond as the interviewer:
- Briefly acknowledge the candidate's last answer (one sentence, no grading)
- If the answer was vague, you may ask ONE short follow-up instead of a new question
- Otherwise ask the next question
- If all {question_count} questions have been asked, thank the candidate and close the interview

Reply in plain text, at most 120 words, without speaker labels or markdown. It will be read aloud."#;

/// Feedback prompt template.
/// Replace: {interview_type}, {role}, {experience_level}, {transcript}, {json_only}
pub const FEEDBACK_PROMPT_TEMPLATE: &str = r#"You are an experienced hiring manager reviewing a {interview_type} mock interview
for the role of {role} (experience level: {experience_level}).

TRANSCRIPT:
{transcript}

Evaluate ONLY what the candidate actually said. Do not invent answers.

Return a JSON object with this EXACT schema:
{
  "overall_score": 72,
  "summary": "Two or three sentences on overall performance.",
  "strengths": ["Concrete strength with an example from the transcript"],
  "improvements": ["Concrete, actionable improvement"],
  "question_feedback": [
    {
      "question": "The interviewer's question",
      "answer_summary": "What the candidate said, in one sentence",
      "rating": 4,
      "suggestion": "How the answer could be stronger"
    }
  ]
}

SCORING:
- overall_score: 0 – 100
- rating: 1 (poor) – 5 (excellent)
- One question_feedback entry per interviewer question that received an answer

{json_only}"#;

/// Formats conversation history as labelled lines, one turn per line.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|t| {
            let label = match t.speaker {
                Speaker::Interviewer => "Interviewer",
                Speaker::Candidate => "Candidate",
            };
            format!("{label}: {}", t.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
