//! Pipeline state: the single record threaded through one copilot run.
//!
//! Fields are private; stages write through the `commit_*` methods, which
//! refuse to store a record whose upstream prerequisites are absent. This
//! keeps exported states from ever showing e.g. a cover letter without an
//! analysis.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm_client::structured::{lenient_list, lenient_string, lenient_text, null_as_default};

// ────────────────────────────────────────────────────────────────────────────
// Stage and field identifiers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    ParseJobDescription,
    AnalyzeResume,
    GenerateCoverLetter,
}

impl StageId {
    /// Execution order of the pipeline.
    pub const ORDERED: [StageId; 3] = [
        StageId::ParseJobDescription,
        StageId::AnalyzeResume,
        StageId::GenerateCoverLetter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::ParseJobDescription => "parse_job_description",
            StageId::AnalyzeResume => "analyze_resume",
            StageId::GenerateCoverLetter => "generate_cover_letter",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StageId::ParseJobDescription => "Extract and structure job posting information",
            StageId::AnalyzeResume => "Match the resume against the job requirements and score the fit",
            StageId::GenerateCoverLetter => "Write a cover letter tailored to the job and the analysis",
        }
    }

    /// Fields that must be present before the stage may run.
    pub fn requires(self) -> &'static [StateField] {
        match self {
            StageId::ParseJobDescription => &[StateField::JobTextRaw],
            StageId::AnalyzeResume => &[
                StateField::JobTextRaw,
                StateField::ResumeTextRaw,
                StateField::JobDescription,
            ],
            StageId::GenerateCoverLetter => &[
                StateField::JobTextRaw,
                StateField::ResumeTextRaw,
                StateField::JobDescription,
                StateField::ResumeAnalysis,
            ],
        }
    }

    /// Fields the stage writes on commit.
    pub fn produces(self) -> &'static [StateField] {
        match self {
            StageId::ParseJobDescription => &[StateField::JobDescription],
            StageId::AnalyzeResume => &[StateField::ResumeAnalysis, StateField::MatchingScore],
            StageId::GenerateCoverLetter => &[StateField::CoverLetter],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    JobTextRaw,
    ResumeTextRaw,
    JobDescription,
    ResumeAnalysis,
    MatchingScore,
    CoverLetter,
}

impl StateField {
    pub fn as_str(self) -> &'static str {
        match self {
            StateField::JobTextRaw => "job_text_raw",
            StateField::ResumeTextRaw => "resume_text_raw",
            StateField::JobDescription => "job_description",
            StateField::ResumeAnalysis => "resume_analysis",
            StateField::MatchingScore => "matching_score",
            StateField::CoverLetter => "cover_letter",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage records
// ────────────────────────────────────────────────────────────────────────────

/// Structured job posting. Every sub-field is optional in model output, and a
/// wrongly shaped sub-field defaults instead of rejecting the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptionRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: String,
    #[serde(default, alias = "description", deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, alias = "requirements", deserialize_with = "lenient_list")]
    pub required_skills: Vec<String>,
    #[serde(default, alias = "nice_to_have", deserialize_with = "lenient_list")]
    pub nice_to_have_skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub salary_range: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub seniority_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub employment_type: Option<String>,
}

impl JobDescriptionRecord {
    /// Required skills followed by nice-to-have skills.
    pub fn all_skills(&self) -> impl Iterator<Item = &str> {
        self.required_skills
            .iter()
            .chain(self.nice_to_have_skills.iter())
            .map(String::as_str)
    }
}

/// Skill match between the résumé and the parsed job.
///
/// Invariants (enforced by `resume_analyzer::normalize`): `matched_skills` and
/// `missing_skills` are disjoint, every missing skill is one of the job's
/// skills, and all scores lie in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysisRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub matched_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nice_to_have_matches: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience_match: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fit_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
}

/// Generated cover letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetterRecord {
    pub body: String,
    pub tone: String,
    #[serde(default)]
    pub highlighted_skills: Vec<String>,
    #[serde(default)]
    pub key_achievements: Vec<String>,
}

impl CoverLetterRecord {
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    run_id: Uuid,
    job_text_raw: String,
    resume_text_raw: String,
    job_description: Option<JobDescriptionRecord>,
    resume_analysis: Option<ResumeAnalysisRecord>,
    matching_score: Option<f64>,
    /// Mirror of `resume_analysis.missing_skills`, kept for consumers of the flat state.
    skill_gaps: Option<Vec<String>>,
    cover_letter: Option<CoverLetterRecord>,
    executed_stages: Vec<StageId>,
    error: Option<String>,
    error_kind: Option<&'static str>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PipelineState {
    /// Fresh state for one run. Every call gets its own `run_id`.
    pub fn new(job_text_raw: impl Into<String>, resume_text_raw: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            job_text_raw: job_text_raw.into(),
            resume_text_raw: resume_text_raw.into(),
            job_description: None,
            resume_analysis: None,
            matching_score: None,
            skill_gaps: None,
            cover_letter: None,
            executed_stages: Vec::new(),
            error: None,
            error_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn job_text_raw(&self) -> &str {
        &self.job_text_raw
    }

    pub fn resume_text_raw(&self) -> &str {
        &self.resume_text_raw
    }

    pub fn job_description(&self) -> Option<&JobDescriptionRecord> {
        self.job_description.as_ref()
    }

    pub fn resume_analysis(&self) -> Option<&ResumeAnalysisRecord> {
        self.resume_analysis.as_ref()
    }

    pub fn matching_score(&self) -> Option<f64> {
        self.matching_score
    }

    /// Missing skills from the analysis; empty until stage 2 commits.
    pub fn skill_gaps(&self) -> &[String] {
        self.skill_gaps.as_deref().unwrap_or_default()
    }

    pub fn cover_letter(&self) -> Option<&CoverLetterRecord> {
        self.cover_letter.as_ref()
    }

    pub fn executed_stages(&self) -> &[StageId] {
        &self.executed_stages
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Machine-readable kind of `error`, e.g. `"output_parse_failure"`.
    pub fn error_kind(&self) -> Option<&'static str> {
        self.error_kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_present(&self, field: StateField) -> bool {
        match field {
            // Presence, not length: length policy belongs to the input validator.
            StateField::JobTextRaw => !self.job_text_raw.trim().is_empty(),
            StateField::ResumeTextRaw => !self.resume_text_raw.trim().is_empty(),
            StateField::JobDescription => self.job_description.is_some(),
            StateField::ResumeAnalysis => self.resume_analysis.is_some(),
            StateField::MatchingScore => self.matching_score.is_some(),
            StateField::CoverLetter => self.cover_letter.is_some(),
        }
    }

    /// First required field of `stage` that is absent, if any.
    pub fn missing_prerequisite(&self, stage: StageId) -> Option<StateField> {
        stage
            .requires()
            .iter()
            .copied()
            .find(|field| !self.is_present(*field))
    }

    pub(crate) fn record_error(&mut self, kind: &'static str, message: impl Into<String>) {
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.touch();
    }

    pub(crate) fn commit_job_description(
        &mut self,
        record: JobDescriptionRecord,
    ) -> Result<(), StateField> {
        self.ensure_prerequisites(StageId::ParseJobDescription)?;
        self.job_description = Some(record);
        self.record_stage(StageId::ParseJobDescription);
        Ok(())
    }

    pub(crate) fn commit_resume_analysis(
        &mut self,
        record: ResumeAnalysisRecord,
    ) -> Result<(), StateField> {
        self.ensure_prerequisites(StageId::AnalyzeResume)?;
        self.matching_score = Some(record.fit_score);
        self.skill_gaps = Some(record.missing_skills.clone());
        self.resume_analysis = Some(record);
        self.record_stage(StageId::AnalyzeResume);
        Ok(())
    }

    pub(crate) fn commit_cover_letter(
        &mut self,
        record: CoverLetterRecord,
    ) -> Result<(), StateField> {
        self.ensure_prerequisites(StageId::GenerateCoverLetter)?;
        self.cover_letter = Some(record);
        self.record_stage(StageId::GenerateCoverLetter);
        Ok(())
    }

    fn ensure_prerequisites(&self, stage: StageId) -> Result<(), StateField> {
        match self.missing_prerequisite(stage) {
            Some(field) => Err(field),
            None => Ok(()),
        }
    }

    fn record_stage(&mut self, stage: StageId) {
        if !self.executed_stages.contains(&stage) {
            self.executed_stages.push(stage);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
