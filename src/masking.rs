use secrecy::SecretString;

const REDACTED: &str = "[REDACTED]";
const NOT_SET: &str = "(not set)";

/// Render an optional secret for log fields; never reveals the value.
pub fn redact_optional(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(_) => REDACTED,
        None => NOT_SET,
    }
}
