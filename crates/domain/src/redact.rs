//! Secret redaction for log lines and error messages.
//!
//! Any value that looks like a credential (a long alphanumeric token) is
//! masked before it reaches `tracing` or an audit `details` field.

/// Replace any alphanumeric run of 20+ characters with a masked form,
/// keeping the first and last 4 characters so operators can still
/// correlate the value without learning it.
pub fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_token() {
        let msg = "auth failed for key sk-abcdefghijklmnopqrstuvwxyz1234567890";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz1234567890"));
        assert!(masked.contains("sk-a"));
    }

    #[test]
    fn leaves_short_words_alone() {
        let msg = "connection refused to host api.example.com";
        assert_eq!(mask_secrets(msg), msg);
    }
}
