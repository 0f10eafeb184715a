// All LLM prompt constants for the copilot stages.
// The JSON-only instruction from llm_client::prompts is appended to every system prompt.

/// System prompt for job description extraction.
pub const JD_PARSE_SYSTEM: &str = "You are an expert job description analyst. \
    Extract structured information from a raw job posting. \
    Separate hard requirements from nice-to-have skills.";

/// Job description prompt template. Replace `{job_text}` before sending.
pub const JD_PARSE_PROMPT_TEMPLATE: &str = r#"Extract the following job posting into a JSON object with this EXACT schema:
{
  "title": "Senior Backend Engineer",
  "company": "Acme",
  "summary": "One or two sentences describing the role",
  "required_skills": ["Python", "Kafka"],
  "nice_to_have_skills": ["Kubernetes"],
  "salary_range": "$150k - $180k or null",
  "location": "Remote or null",
  "seniority_level": "junior | mid | senior | staff | principal | unknown",
  "employment_type": "full-time | part-time | contract | null"
}

Rules:
- required_skills and nice_to_have_skills are lists of individual skills, never comma-separated strings.
- A skill goes to nice_to_have_skills only when the posting marks it as preferred, bonus, or a plus.
- Use null for anything the posting does not mention. Do NOT guess salaries or locations.

JOB POSTING:
{job_text}"#;

/// System prompt for résumé-to-job analysis.
pub const RESUME_ANALYSIS_SYSTEM: &str = "You are an expert recruiter and resume analyst. \
    Compare a candidate resume against a parsed job description and score the fit realistically.";

/// Résumé analysis prompt template.
/// Replace: {job_title}, {company}, {required_skills}, {nice_to_have_skills}, {resume_text}
pub const RESUME_ANALYSIS_PROMPT_TEMPLATE: &str = r#"JOB:
Title: {job_title}
Company: {company}
Required skills: {required_skills}
Nice-to-have skills: {nice_to_have_skills}

Return a JSON object with this EXACT schema:
{
  "matched_skills": ["skills from the job that the resume demonstrates"],
  "missing_skills": ["job skills the resume does not demonstrate"],
  "nice_to_have_matches": ["nice-to-have skills the resume demonstrates"],
  "experience_match": "How well the experience aligns with the role",
  "experience_score": 0.8,
  "skills_score": 0.75,
  "fit_score": 0.78,
  "strengths": ["strengths worth highlighting in a cover letter"],
  "weaknesses": ["gaps to address"],
  "recommendations": ["concrete advice for this application"]
}

Rules:
- A skill is either matched or missing, never both.
- missing_skills may only contain skills listed in the job above.
- All scores are between 0.0 and 1.0.

RESUME:
{resume_text}"#;

/// System prompt for cover letter generation.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert cover letter writer and career coach. \
    Write a tailored, factual cover letter using only what the resume supports.";

/// Cover letter prompt template.
/// Replace: {job_title}, {company}, {job_summary}, {required_skills}, {matched_skills},
///          {missing_skills}, {strengths}, {fit_percent}, {resume_text}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"POSITION: {job_title} at {company}
ROLE SUMMARY: {job_summary}
REQUIRED SKILLS: {required_skills}

ANALYSIS:
- Matched skills: {matched_skills}
- Missing skills: {missing_skills}
- Key strengths: {strengths}
- Overall fit: {fit_percent}%

Write a cover letter that:
1. Opens with genuine interest in the role and company
2. Highlights 3-4 matched skills with specific examples from the resume
3. Addresses missing skills briefly and honestly, if any
4. Includes quantifiable achievements where the resume provides them
5. Ends with a clear call to action

Keep it to 3-4 paragraphs, around 250-300 words.

Return a JSON object with this EXACT schema:
{
  "body": "Dear Hiring Manager,\n\n...\n\nBest regards",
  "tone": "professional",
  "highlighted_skills": ["skill1", "skill2"],
  "key_achievements": ["achievement1", "achievement2"]
}

RESUME:
{resume_text}"#;
