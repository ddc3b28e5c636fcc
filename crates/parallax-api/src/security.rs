//! Input validation for values that reach logs or storage keys.

/// Maximum length of client text echoed into logs.
const MAX_LOGGED_LENGTH: usize = 256;

/// Validate task ID format.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
pub fn is_valid_job_id(id: &str) -> bool {
    if id.len() > 64 || id.len() < 8 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Strip control characters and cap the length of client-supplied text
/// before it is logged.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_LOGGED_LENGTH)
        .collect()
}
