//! Test doubles for the text-generation seam, plus shared fixtures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::copilot::prompts::{COVER_LETTER_SYSTEM, JD_PARSE_SYSTEM, RESUME_ANALYSIS_SYSTEM};
use crate::llm_client::{LlmError, LlmGateway, LlmOptions, TextGenerator};

pub const SCENARIO_JOB: &str = "Senior Backend Engineer at Acme, requires Python and Kafka";
pub const SCENARIO_RESUME: &str = "5 years Python, built Kafka pipelines";

pub const ACME_JD_JSON: &str = r#"{
  "title": "Senior Backend Engineer",
  "company": "Acme",
  "summary": "Build and operate streaming backend services.",
  "required_skills": ["Python", "Kafka"],
  "nice_to_have_skills": [],
  "salary_range": null,
  "location": "Remote",
  "seniority_level": "senior",
  "employment_type": "full-time"
}"#;

pub const ACME_ANALYSIS_JSON: &str = r#"{
  "matched_skills": ["Python", "Kafka"],
  "missing_skills": [],
  "nice_to_have_matches": [],
  "experience_match": "Five years of Python with production Kafka pipelines.",
  "experience_score": 0.9,
  "skills_score": 1.0,
  "fit_score": 0.95,
  "strengths": ["Kafka pipelines", "Python depth"],
  "weaknesses": [],
  "recommendations": ["Quantify pipeline throughput"]
}"#;

pub const ACME_LETTER_JSON: &str = r#"{
  "body": "Dear Hiring Manager,\n\nI am excited to apply for the Senior Backend Engineer role at Acme. Over five years of Python work I built Kafka pipelines that moved data reliably at scale.\n\nBest regards",
  "tone": "professional",
  "highlighted_skills": ["Python", "Kafka"],
  "key_achievements": ["Built Kafka pipelines"]
}"#;

/// Replays queued responses in order, one per call. Exhausted queues yield `EmptyContent`.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

pub fn scripted(responses: Vec<Result<String, LlmError>>) -> Arc<ScriptedGenerator> {
    Arc::new(ScriptedGenerator {
        responses: Mutex::new(responses.into()),
        calls: AtomicUsize::new(0),
    })
}

/// Answers from a closure over `(system, prompt)`; safe to share across concurrent runs.
pub struct FnGenerator<F>(F);

#[async_trait]
impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str, &str) -> Result<String, LlmError> + Send + Sync,
{
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        (self.0)(system, prompt)
    }
}

/// Routes each call to a fixed answer by which stage's system prompt it carries.
pub fn by_stage(
    job: &'static str,
    analysis: &'static str,
    letter: &'static str,
) -> Arc<FnGenerator<impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync>> {
    Arc::new(FnGenerator(move |system: &str, _prompt: &str| {
        if system.starts_with(JD_PARSE_SYSTEM) {
            Ok(job.to_string())
        } else if system.starts_with(RESUME_ANALYSIS_SYSTEM) {
            Ok(analysis.to_string())
        } else if system.starts_with(COVER_LETTER_SYSTEM) {
            Ok(letter.to_string())
        } else {
            Err(LlmError::EmptyContent)
        }
    }))
}

/// Derives every answer from the prompt it is given, so concurrent runs
/// over different postings produce visibly different results.
///
/// Postings are expected in the form `"<title> at <company>, ..."`.
pub fn echo_company() -> Arc<FnGenerator<impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync>> {
    Arc::new(FnGenerator(|system: &str, prompt: &str| {
        if system.starts_with(JD_PARSE_SYSTEM) {
            let posting = prompt.rsplit("JOB POSTING:\n").next().unwrap_or_default();
            let (title, rest) = posting.split_once(" at ").unwrap_or((posting, ""));
            let company = rest.split(',').next().unwrap_or_default();
            Ok(serde_json::json!({
                "title": title.trim(),
                "company": company.trim(),
                "required_skills": ["Python"],
            })
            .to_string())
        } else if system.starts_with(RESUME_ANALYSIS_SYSTEM) {
            Ok(r#"{"matched_skills": ["Python"], "fit_score": 0.5}"#.to_string())
        } else if system.starts_with(COVER_LETTER_SYSTEM) {
            let position = prompt
                .lines()
                .find_map(|line| line.strip_prefix("POSITION: "))
                .unwrap_or_default();
            Ok(serde_json::json!({ "body": format!("Dear {position} hiring team, hello.") }).to_string())
        } else {
            Err(LlmError::EmptyContent)
        }
    }))
}

pub fn test_options() -> LlmOptions {
    LlmOptions::new("test-model", "sk-test")
}

/// A gateway whose every client is `generator`.
pub fn gateway_with<G: TextGenerator + 'static>(generator: Arc<G>) -> LlmGateway {
    LlmGateway::with_builder(
        || Ok(test_options()),
        move |_| Ok(generator.clone() as Arc<dyn TextGenerator>),
    )
}
