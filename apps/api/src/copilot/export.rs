//! Serializable views over a finished `PipelineState`.
//!
//! Absent records export as `null`/zero rather than failing, so a degraded
//! run can still be reported.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::copilot::state::{PipelineState, StageId};

#[derive(Debug, Clone, Serialize)]
pub struct ExportedResult {
    pub job_description: ExportedJob,
    pub analysis: ExportedAnalysis,
    pub cover_letter: ExportedCoverLetter,
    pub metadata: ExportedMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedJob {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub requirements_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedAnalysis {
    pub overall_fit_score: Option<f64>,
    pub matched_skills_count: usize,
    pub missing_skills_count: usize,
    pub experience_score: Option<f64>,
    pub skills_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedCoverLetter {
    pub body: Option<String>,
    pub tone: Option<String>,
    pub highlighted_skills_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedMetadata {
    pub run_id: Uuid,
    pub executed_stages: Vec<StageId>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExportedResult {
    pub fn from_state(state: &PipelineState) -> Self {
        let job = state.job_description();
        let analysis = state.resume_analysis();
        let letter = state.cover_letter();

        Self {
            job_description: ExportedJob {
                title: job.map(|j| j.title.clone()),
                company: job.map(|j| j.company.clone()),
                location: job.and_then(|j| j.location.clone()),
                salary_range: job.and_then(|j| j.salary_range.clone()),
                requirements_count: job.map_or(0, |j| j.required_skills.len()),
            },
            analysis: ExportedAnalysis {
                overall_fit_score: state.matching_score(),
                matched_skills_count: analysis.map_or(0, |a| a.matched_skills.len()),
                missing_skills_count: analysis.map_or(0, |a| a.missing_skills.len()),
                experience_score: analysis.map(|a| a.experience_score),
                skills_score: analysis.map(|a| a.skills_score),
            },
            cover_letter: ExportedCoverLetter {
                body: letter.map(|l| l.body.clone()),
                tone: letter.map(|l| l.tone.clone()),
                highlighted_skills_count: letter.map_or(0, |l| l.highlighted_skills.len()),
            },
            metadata: ExportedMetadata {
                run_id: state.run_id(),
                executed_stages: state.executed_stages().to_vec(),
                error: state.error().map(str::to_string),
                created_at: state.created_at(),
                updated_at: state.updated_at(),
            },
        }
    }
}

/// Human-oriented digest of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job: SummaryJob,
    pub fit_assessment: FitAssessment,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub key_strengths: Vec<String>,
    pub recommendations: Vec<String>,
    pub cover_letter_ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryJob {
    pub title: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitAssessment {
    pub overall_score: String,
    pub skills_alignment: String,
    pub experience_alignment: String,
}

const SUMMARY_TOP_N: usize = 3;

impl RunSummary {
    pub fn from_state(state: &PipelineState) -> Self {
        let job = state.job_description();
        let analysis = state.resume_analysis().cloned().unwrap_or_default();

        Self {
            job: SummaryJob {
                title: job.map(|j| j.title.clone()),
                company: job.map(|j| j.company.clone()),
            },
            fit_assessment: FitAssessment {
                overall_score: percent(state.matching_score().unwrap_or(0.0)),
                skills_alignment: percent(analysis.skills_score),
                experience_alignment: percent(analysis.experience_score),
            },
            key_strengths: top(&analysis.strengths),
            recommendations: top(&analysis.recommendations),
            matched_skills: analysis.matched_skills,
            missing_skills: analysis.missing_skills,
            cover_letter_ready: state.cover_letter().is_some(),
        }
    }
}

/// `0.78` → `"78.0%"`.
fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn top(items: &[String]) -> Vec<String> {
    items.iter().take(SUMMARY_TOP_N).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copilot::state::{CoverLetterRecord, ResumeAnalysisRecord};
    use crate::copilot::testing::{ACME_JD_JSON, SCENARIO_JOB, SCENARIO_RESUME};
    use crate::llm_client::structured::parse_object;

    fn analyzed_state() -> PipelineState {
        let mut state = PipelineState::new(SCENARIO_JOB, SCENARIO_RESUME);
        state
            .commit_job_description(parse_object(ACME_JD_JSON).unwrap())
            .unwrap();
        state
            .commit_resume_analysis(ResumeAnalysisRecord {
                matched_skills: vec!["Python".to_string()],
                missing_skills: vec!["Kafka".to_string()],
                fit_score: 0.78,
                skills_score: 0.5,
                experience_score: 0.925,
                strengths: (1..=5).map(|i| format!("strength {i}")).collect(),
                recommendations: vec!["one".to_string()],
                ..Default::default()
            })
            .unwrap();
        state
    }

    #[test]
    fn test_export_of_fresh_state_is_empty_not_failing() {
        let state = PipelineState::new("", "");
        let export = ExportedResult::from_state(&state);

        assert!(export.job_description.title.is_none());
        assert_eq!(export.job_description.requirements_count, 0);
        assert!(export.analysis.overall_fit_score.is_none());
        assert!(export.cover_letter.body.is_none());
        assert_eq!(export.metadata.run_id, state.run_id());
        assert_eq!(export.metadata.created_at, export.metadata.updated_at);
        assert!(export.metadata.executed_stages.is_empty());
    }

    #[test]
    fn test_export_counts_and_metadata() {
        let state = analyzed_state();
        let export = ExportedResult::from_state(&state);

        assert_eq!(export.job_description.company.as_deref(), Some("Acme"));
        assert_eq!(export.job_description.location.as_deref(), Some("Remote"));
        assert_eq!(export.job_description.requirements_count, 2);
        assert_eq!(export.analysis.overall_fit_score, Some(0.78));
        assert_eq!(export.analysis.matched_skills_count, 1);
        assert_eq!(export.analysis.missing_skills_count, 1);
        assert_eq!(
            export.metadata.executed_stages,
            vec![StageId::ParseJobDescription, StageId::AnalyzeResume]
        );

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["metadata"]["executed_stages"][1], "analyze_resume");
        assert!(json["cover_letter"]["body"].is_null());
        assert!(export.metadata.updated_at >= export.metadata.created_at);
    }

    #[test]
    fn test_summary_formats_percentages_and_truncates() {
        let mut state = analyzed_state();
        let summary = RunSummary::from_state(&state);

        assert_eq!(summary.fit_assessment.overall_score, "78.0%");
        assert_eq!(summary.fit_assessment.skills_alignment, "50.0%");
        assert_eq!(summary.fit_assessment.experience_alignment, "92.5%");
        assert_eq!(summary.key_strengths.len(), 3);
        assert_eq!(summary.recommendations, vec!["one"]);
        assert!(!summary.cover_letter_ready);

        state
            .commit_cover_letter(CoverLetterRecord {
                body: "Dear Acme".to_string(),
                tone: "professional".to_string(),
                highlighted_skills: vec![],
                key_achievements: vec![],
            })
            .unwrap();
        assert!(RunSummary::from_state(&state).cover_letter_ready);
    }

    #[test]
    fn test_summary_without_analysis_reports_zero() {
        let summary = RunSummary::from_state(&PipelineState::new("job", "resume"));
        assert_eq!(summary.fit_assessment.overall_score, "0.0%");
        assert!(summary.matched_skills.is_empty());
        assert!(summary.job.title.is_none());
    }
}
