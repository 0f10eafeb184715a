//! Stage 3: writes a tailored cover letter from the job and the analysis.
//!
//! Length is a soft target: letters outside 250–300 words are logged, not rejected.

use std::ops::RangeInclusive;

use serde::Deserialize;
use tracing::warn;

use crate::copilot::prompts::{COVER_LETTER_PROMPT_TEMPLATE, COVER_LETTER_SYSTEM};
use crate::copilot::stage::{self, Stage};
use crate::copilot::state::{CoverLetterRecord, PipelineState, StageId, StateField};
use crate::llm_client::structured::{
    lenient_list, lenient_string, lenient_text, parse_object, StructuredOutputError,
};
use crate::llm_client::LlmGateway;

pub const TARGET_WORDS: RangeInclusive<usize> = 250..=300;
const DEFAULT_TONE: &str = "professional";

#[derive(Debug, Deserialize)]
struct RawCoverLetter {
    #[serde(default, alias = "content", deserialize_with = "lenient_string")]
    body: String,
    #[serde(default, deserialize_with = "lenient_text")]
    tone: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    highlighted_skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    key_achievements: Vec<String>,
}

pub struct CoverLetterStage;

impl Stage for CoverLetterStage {
    const ID: StageId = StageId::GenerateCoverLetter;
    const SYSTEM: &'static str = COVER_LETTER_SYSTEM;

    type Output = CoverLetterRecord;

    fn build_prompt(state: &PipelineState) -> String {
        let job = state.job_description().cloned().unwrap_or_default();
        let analysis = state.resume_analysis().cloned().unwrap_or_default();
        let fit_percent = (analysis.fit_score * 100.0).round() as u32;

        COVER_LETTER_PROMPT_TEMPLATE
            .replace("{job_title}", &job.title)
            .replace("{company}", &job.company)
            .replace("{job_summary}", &job.summary)
            .replace("{required_skills}", &job.required_skills.join(", "))
            .replace("{matched_skills}", &analysis.matched_skills.join(", "))
            .replace("{missing_skills}", &analysis.missing_skills.join(", "))
            .replace("{strengths}", &analysis.strengths.join(", "))
            .replace("{fit_percent}", &fit_percent.to_string())
            .replace("{resume_text}", state.resume_text_raw())
    }

    fn parse(text: &str, state: &PipelineState) -> Result<Self::Output, StructuredOutputError> {
        let raw: RawCoverLetter = parse_object(text)?;

        let body = raw.body.trim().to_string();
        if body.is_empty() {
            return Err(StructuredOutputError::Invalid(
                "cover letter body is empty".to_string(),
            ));
        }

        let record = CoverLetterRecord {
            body,
            tone: raw
                .tone
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TONE.to_string()),
            highlighted_skills: raw.highlighted_skills,
            key_achievements: raw.key_achievements,
        };

        let words = record.word_count();
        if !TARGET_WORDS.contains(&words) {
            warn!(
                run_id = %state.run_id(),
                "Cover letter has {words} words (target {}-{})",
                TARGET_WORDS.start(),
                TARGET_WORDS.end()
            );
        }

        Ok(record)
    }

    fn commit(state: &mut PipelineState, output: Self::Output) -> Result<(), StateField> {
        state.commit_cover_letter(output)
    }
}

/// Generates the cover letter into `state.cover_letter`.
pub async fn generate_cover_letter(state: PipelineState, gateway: &LlmGateway) -> PipelineState {
    stage::execute::<CoverLetterStage>(state, gateway).await
}
