//! Stage 2: matches the résumé against the parsed job and scores the fit.
//!
//! Model output is normalized before commit so the record always satisfies:
//! - `matched_skills ∩ missing_skills = ∅`
//! - every missing skill is one of the job's required or nice-to-have skills
//! - every score lies in [0, 1]
//!
//! When the model omits the fit score it is derived from weighted skill
//! coverage: required skills weigh 1.0, nice-to-have skills 0.5.

use std::collections::HashSet;

use serde::Deserialize;

use crate::copilot::jd_parser::{dedupe_skills, skill_key};
use crate::copilot::prompts::{RESUME_ANALYSIS_PROMPT_TEMPLATE, RESUME_ANALYSIS_SYSTEM};
use crate::copilot::stage::{self, Stage};
use crate::copilot::state::{
    JobDescriptionRecord, PipelineState, ResumeAnalysisRecord, StageId, StateField,
};
use crate::llm_client::structured::{
    lenient_list, lenient_score, lenient_string, parse_object, StructuredOutputError,
};
use crate::llm_client::LlmGateway;

const REQUIRED_WEIGHT: f64 = 1.0;
const NICE_TO_HAVE_WEIGHT: f64 = 0.5;

/// Analysis as the model returns it, before normalization.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default, deserialize_with = "lenient_list")]
    matched_skills: Vec<String>,
    #[serde(default, alias = "skill_gaps", deserialize_with = "lenient_list")]
    missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    nice_to_have_matches: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    experience_match: String,
    #[serde(default, deserialize_with = "lenient_score")]
    experience_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    skills_score: Option<f64>,
    #[serde(default, alias = "overall_fit_score", deserialize_with = "lenient_score")]
    fit_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    recommendations: Vec<String>,
}

pub struct ResumeAnalysisStage;

impl Stage for ResumeAnalysisStage {
    const ID: StageId = StageId::AnalyzeResume;
    const SYSTEM: &'static str = RESUME_ANALYSIS_SYSTEM;

    type Output = ResumeAnalysisRecord;

    fn build_prompt(state: &PipelineState) -> String {
        let job = state.job_description().cloned().unwrap_or_default();
        RESUME_ANALYSIS_PROMPT_TEMPLATE
            .replace("{job_title}", &job.title)
            .replace("{company}", &job.company)
            .replace("{required_skills}", &job.required_skills.join(", "))
            .replace("{nice_to_have_skills}", &job.nice_to_have_skills.join(", "))
            .replace("{resume_text}", state.resume_text_raw())
    }

    fn parse(text: &str, state: &PipelineState) -> Result<Self::Output, StructuredOutputError> {
        let raw: RawAnalysis = parse_object(text)?;
        let job = state.job_description().ok_or_else(|| {
            StructuredOutputError::Invalid("no job description to analyze against".to_string())
        })?;
        Ok(normalize(raw, job))
    }

    fn commit(state: &mut PipelineState, output: Self::Output) -> Result<(), StateField> {
        state.commit_resume_analysis(output)
    }
}

/// Analyzes the résumé against `state.job_description` and sets the fit score.
pub async fn analyze_resume(state: PipelineState, gateway: &LlmGateway) -> PipelineState {
    stage::execute::<ResumeAnalysisStage>(state, gateway).await
}

fn normalize(raw: RawAnalysis, job: &JobDescriptionRecord) -> ResumeAnalysisRecord {
    let matched_skills = dedupe_skills(raw.matched_skills);
    let matched: HashSet<String> = matched_skills.iter().map(|s| skill_key(s)).collect();
    let job_skills: HashSet<String> = job.all_skills().map(skill_key).collect();

    let missing_skills = dedupe_skills(raw.missing_skills)
        .into_iter()
        .filter(|s| {
            let key = skill_key(s);
            !matched.contains(&key) && job_skills.contains(&key)
        })
        .collect();

    let fit_score = raw
        .fit_score
        .and_then(clamp_unit)
        .unwrap_or_else(|| coverage_score(&matched, job));

    ResumeAnalysisRecord {
        matched_skills,
        missing_skills,
        nice_to_have_matches: dedupe_skills(raw.nice_to_have_matches),
        experience_match: raw.experience_match.trim().to_string(),
        experience_score: raw.experience_score.and_then(clamp_unit).unwrap_or(0.0),
        skills_score: raw.skills_score.and_then(clamp_unit).unwrap_or(0.0),
        fit_score,
        strengths: raw.strengths,
        weaknesses: raw.weaknesses,
        recommendations: raw.recommendations,
    }
}

fn clamp_unit(score: f64) -> Option<f64> {
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// Weighted share of the job's skills that appear in `matched`.
fn coverage_score(matched: &HashSet<String>, job: &JobDescriptionRecord) -> f64 {
    let mut seen = HashSet::new();
    let weighted = job
        .required_skills
        .iter()
        .map(|s| (s, REQUIRED_WEIGHT))
        .chain(job.nice_to_have_skills.iter().map(|s| (s, NICE_TO_HAVE_WEIGHT)))
        .filter(|(s, _)| seen.insert(skill_key(s)));

    let mut total = 0.0;
    let mut covered = 0.0;
    for (skill, weight) in weighted {
        total += weight;
        if matched.contains(&skill_key(skill)) {
            covered += weight;
        }
    }

    if total > 0.0 {
        covered / total
    } else {
        0.0
    }
}
