//! Stage 1: extracts a structured job description from the raw posting.

use std::collections::HashSet;

use crate::copilot::prompts::{JD_PARSE_PROMPT_TEMPLATE, JD_PARSE_SYSTEM};
use crate::copilot::stage::{self, Stage};
use crate::copilot::state::{JobDescriptionRecord, PipelineState, StageId, StateField};
use crate::llm_client::structured::{parse_object, StructuredOutputError};
use crate::llm_client::LlmGateway;

pub struct JobDescriptionStage;

impl Stage for JobDescriptionStage {
    const ID: StageId = StageId::ParseJobDescription;
    const SYSTEM: &'static str = JD_PARSE_SYSTEM;

    type Output = JobDescriptionRecord;

    fn build_prompt(state: &PipelineState) -> String {
        JD_PARSE_PROMPT_TEMPLATE.replace("{job_text}", state.job_text_raw())
    }

    fn parse(text: &str, _state: &PipelineState) -> Result<Self::Output, StructuredOutputError> {
        let record: JobDescriptionRecord = parse_object(text)?;
        Ok(tidy(record))
    }

    fn commit(state: &mut PipelineState, output: Self::Output) -> Result<(), StateField> {
        state.commit_job_description(output)
    }
}

/// Parses the raw job posting into `state.job_description`.
pub async fn parse_job_description(state: PipelineState, gateway: &LlmGateway) -> PipelineState {
    stage::execute::<JobDescriptionStage>(state, gateway).await
}

/// Case- and whitespace-insensitive identity of a skill.
pub(crate) fn skill_key(skill: &str) -> String {
    skill.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Trims entries, drops blanks, and removes case-insensitive duplicates,
/// keeping the first spelling in original order.
pub(crate) fn dedupe_skills(skills: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(skill_key(s)))
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn tidy(record: JobDescriptionRecord) -> JobDescriptionRecord {
    let required_skills = dedupe_skills(record.required_skills);
    let required: HashSet<String> = required_skills.iter().map(|s| skill_key(s)).collect();

    // A skill listed as both required and nice-to-have counts as required.
    let nice_to_have_skills = dedupe_skills(record.nice_to_have_skills)
        .into_iter()
        .filter(|s| !required.contains(&skill_key(s)))
        .collect();

    JobDescriptionRecord {
        title: record.title.trim().to_string(),
        company: record.company.trim().to_string(),
        summary: record.summary.trim().to_string(),
        required_skills,
        nice_to_have_skills,
        salary_range: non_blank(record.salary_range),
        location: non_blank(record.location),
        seniority_level: non_blank(record.seniority_level),
        employment_type: non_blank(record.employment_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copilot::testing::{gateway_with, scripted, ACME_JD_JSON, SCENARIO_JOB, SCENARIO_RESUME};

    fn parse(text: &str) -> Result<JobDescriptionRecord, StructuredOutputError> {
        JobDescriptionStage::parse(text, &PipelineState::new("job", "resume"))
    }

    #[test]
    fn test_full_record_deserializes() {
        let record = parse(ACME_JD_JSON).unwrap();
        assert_eq!(record.title, "Senior Backend Engineer");
        assert_eq!(record.company, "Acme");
        assert_eq!(record.required_skills, vec!["Python", "Kafka"]);
        assert_eq!(record.location.as_deref(), Some("Remote"));
        assert!(record.salary_range.is_none());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let record = parse(r#"{"title": "Data Engineer"}"#).unwrap();
        assert_eq!(record.title, "Data Engineer");
        assert!(record.company.is_empty());
        assert!(record.required_skills.is_empty());
        assert!(record.nice_to_have_skills.is_empty());
        assert!(record.location.is_none());
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let record = parse(
            r#"{
                "title": "SRE",
                "description": "Keep things running",
                "requirements": ["Linux", "Terraform"],
                "nice_to_have": ["Go"]
            }"#,
        )
        .unwrap();
        assert_eq!(record.summary, "Keep things running");
        assert_eq!(record.required_skills, vec!["Linux", "Terraform"]);
        assert_eq!(record.nice_to_have_skills, vec!["Go"]);
    }

    #[test]
    fn test_nulls_and_blank_strings_are_normalized() {
        let record = parse(
            r#"{
                "title": null,
                "required_skills": null,
                "salary_range": "  ",
                "location": "null"
            }"#,
        )
        .unwrap();
        assert!(record.title.is_empty());
        assert!(record.required_skills.is_empty());
        assert!(record.salary_range.is_none());
        assert!(record.location.is_none());
    }

    #[test]
    fn test_skills_are_deduplicated_and_required_wins() {
        let record = parse(
            r#"{
                "required_skills": ["Python", " python ", "Kafka", ""],
                "nice_to_have_skills": ["kafka", "Kubernetes", "Kubernetes"]
            }"#,
        )
        .unwrap();
        assert_eq!(record.required_skills, vec!["Python", "Kafka"]);
        assert_eq!(record.nice_to_have_skills, vec!["Kubernetes"]);
    }

    #[test]
    fn test_structured_salary_does_not_fail_the_record() {
        let record = parse(
            r#"{
                "title": "Senior Backend Engineer",
                "company": "Acme",
                "required_skills": ["Python"],
                "salary_range": {"min": 150000, "max": 180000},
                "location": ["Remote", "Berlin"]
            }"#,
        )
        .unwrap();
        assert_eq!(record.title, "Senior Backend Engineer");
        assert_eq!(record.required_skills, vec!["Python"]);
        assert!(record.salary_range.is_none());
        assert!(record.location.is_none());
    }

    #[test]
    fn test_scalar_optionals_are_stringified() {
        let record = parse(r#"{"title": "SRE", "salary_range": 120000, "employment_type": true}"#).unwrap();
        assert_eq!(record.salary_range.as_deref(), Some("120000"));
        assert_eq!(record.employment_type.as_deref(), Some("true"));
    }

    #[test]
    fn test_comma_separated_skills_are_split() {
        let record = parse(
            r#"{"requirements": "Python, Kafka,  SQL", "nice_to_have_skills": "Kubernetes; python"}"#,
        )
        .unwrap();
        assert_eq!(record.required_skills, vec!["Python", "Kafka", "SQL"]);
        assert_eq!(record.nice_to_have_skills, vec!["Kubernetes"]);
    }

    #[test]
    fn test_wrongly_shaped_title_defaults_to_empty() {
        let record = parse(r#"{"title": {"text": "SRE"}, "company": 42}"#).unwrap();
        assert!(record.title.is_empty());
        assert_eq!(record.company, "42");
    }

    #[test]
    fn test_unparseable_output_is_rejected() {
        assert!(parse("The posting is for an engineer.").is_err());
    }

    #[test]
    fn test_prompt_embeds_raw_job_text() {
        let state = PipelineState::new(SCENARIO_JOB, SCENARIO_RESUME);
        let prompt = JobDescriptionStage::build_prompt(&state);
        assert!(prompt.contains(SCENARIO_JOB));
        assert!(!prompt.contains("{job_text}"));
    }

    #[test]
    fn test_skill_key_ignores_case_and_spacing() {
        assert_eq!(skill_key("  Machine   Learning "), skill_key("machine learning"));
    }

    #[tokio::test]
    async fn test_stage_commits_record_and_marks_executed() {
        let gateway = gateway_with(scripted(vec![Ok(ACME_JD_JSON.to_string())]));
        let state = parse_job_description(PipelineState::new(SCENARIO_JOB, SCENARIO_RESUME), &gateway).await;

        assert!(state.error().is_none());
        assert_eq!(state.job_description().unwrap().company, "Acme");
        assert_eq!(state.executed_stages(), &[StageId::ParseJobDescription]);
    }

    #[tokio::test]
    async fn test_empty_job_text_skips_model_call() {
        let generator = scripted(vec![]);
        let gateway = gateway_with(generator.clone());
        let state = parse_job_description(PipelineState::new("", SCENARIO_RESUME), &gateway).await;

        assert!(state.error().unwrap().contains("job_text_raw"));
        assert!(state.executed_stages().is_empty());
        assert_eq!(generator.calls(), 0);
    }
}
