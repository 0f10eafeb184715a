// Job Copilot: job description parsing, résumé analysis, cover letter generation.
// All LLM calls go through llm_client::LlmGateway; stages never build clients themselves.

pub mod cover_letter;
pub mod export;
pub mod handlers;
pub mod jd_parser;
pub mod pipeline;
pub mod prompts;
pub mod resume_analyzer;
pub mod stage;
pub mod state;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
