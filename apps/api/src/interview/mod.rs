// Interview simulator: question plans, interviewer turns, and feedback.
// All LLM calls go through llm_client; no direct upstream calls here.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod session;

#[cfg(test)]
pub mod testing;
