use crate::errors::AppError;

/// Minimum length, in characters after trimming, of both inputs.
pub const MIN_INPUT_LENGTH: usize = 50;

/// Checks the two free-text inputs of a copilot request.
///
/// This is HTTP-level policy. The pipeline itself only requires the texts to
/// be non-blank and will run (and degrade) on anything shorter.
pub fn validate_inputs(job_description: &str, resume: &str) -> Result<(), AppError> {
    check_field("job_description", job_description)?;
    check_field("resume", resume)
}

fn check_field(name: &str, value: &str) -> Result<(), AppError> {
    let length = value.trim().chars().count();
    if length == 0 {
        return Err(AppError::Validation(format!("{name} is required")));
    }
    if length < MIN_INPUT_LENGTH {
        return Err(AppError::Validation(format!(
            "{name} must be at least {MIN_INPUT_LENGTH} characters (got {length})"
        )));
    }
    Ok(())
}
