//! Shape checks run before anything is sent to the backend.
//!
//! These are structural heuristics only. Passing them says nothing about whether the backend
//! will accept the value.

use regex::Regex;
use std::sync::LazyLock;

/// Shortest string accepted as a plausible bearer token.
pub const MIN_CREDENTIAL_LEN: usize = 50;

/// Default cap for free-text fields.
pub const DEFAULT_MAX_INPUT_LEN: usize = 2000;

static SNOWFLAKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{17,19}$").unwrap());

static WEBHOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://discord\.com/api/webhooks/([0-9]{17,19})/([A-Za-z0-9_-]+)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Credential looks malformed (expected at least {MIN_CREDENTIAL_LEN} characters)")]
    CredentialShape,

    #[error("{0} must be a 17-19 digit numeric id")]
    Snowflake(&'static str),

    #[error("{0} is not a valid webhook URL")]
    WebhookUrl(&'static str),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("{0} must be a whole number")]
    NotANumber(&'static str),

    #[error("{0} must be true or false")]
    NotAFlag(&'static str),

    #[error("{field} must be one of: {options}")]
    NotAChoice {
        field: &'static str,
        options: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookParts {
    pub id: String,
    pub token: String,
}

pub fn is_credential_shape(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().count() >= MIN_CREDENTIAL_LEN
}

pub fn is_snowflake(value: &str) -> bool {
    SNOWFLAKE_RE.is_match(value.trim())
}

/// Extract id and token from a webhook URL. Non-conforming input yields `None`.
pub fn parse_webhook_url(value: &str) -> Option<WebhookParts> {
    let caps = WEBHOOK_RE.captures(value.trim())?;
    Some(WebhookParts {
        id: caps[1].to_string(),
        token: caps[2].to_string(),
    })
}

pub fn sanitize_input(input: &str, max_len: usize) -> String {
    input.trim().chars().take(max_len).collect()
}

/// CDN avatar URL; accounts without an avatar get one of the six default images.
pub fn avatar_url(user_id: &str, avatar_hash: Option<&str>, size: u32) -> String {
    match avatar_hash.filter(|h| !h.is_empty()) {
        Some(hash) => {
            let ext = if hash.starts_with("a_") { "gif" } else { "png" };
            format!(
                "https://cdn.discordapp.com/avatars/{}/{}.{}?size={}",
                user_id, hash, ext, size
            )
        }
        None => {
            let index = user_id.trim().parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0);
            format!("https://cdn.discordapp.com/embed/avatars/{}.png", index)
        }
    }
}

pub fn require_credential(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing("Credential"));
    }
    if !is_credential_shape(value) {
        return Err(ValidationError::CredentialShape);
    }
    Ok(())
}

pub fn require_snowflake(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if !is_snowflake(value) {
        return Err(ValidationError::Snowflake(field));
    }
    Ok(())
}

pub fn require_webhook_url(
    field: &'static str,
    value: &str,
) -> Result<WebhookParts, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing(field));
    }
    parse_webhook_url(value).ok_or(ValidationError::WebhookUrl(field))
}

pub fn require_range(
    field: &'static str,
    value: &str,
    min: u64,
    max: u64,
) -> Result<u64, ValidationError> {
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::NotANumber(field))?;
    if parsed < min || parsed > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_shape_requires_fifty_chars() {
        assert!(!is_credential_shape(""));
        assert!(!is_credential_shape("   "));
        assert!(!is_credential_shape(&"a".repeat(49)));
        assert!(is_credential_shape(&"a".repeat(50)));
        assert!(is_credential_shape(&format!("  {}  ", "a".repeat(50))));
    }

    #[test]
    fn snowflake_accepts_17_to_19_digits() {
        assert!(is_snowflake("12345678901234567"));
        assert!(is_snowflake(" 1234567890123456789 "));
        assert!(!is_snowflake("1234567890123456"));
        assert!(!is_snowflake("12345678901234567890"));
        assert!(!is_snowflake("12345678901234567a"));
        assert!(!is_snowflake(""));
    }

    #[test]
    fn webhook_url_parses_id_and_token() {
        let url = "https://discord.com/api/webhooks/123456789012345678/abc_DEF-123";
        assert_eq!(
            parse_webhook_url(url),
            Some(WebhookParts {
                id: "123456789012345678".to_string(),
                token: "abc_DEF-123".to_string(),
            })
        );
    }

    #[test]
    fn ids_and_webhook_tokens_are_ascii_only() {
        assert!(!is_snowflake("١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦٧٨"));
        assert!(!is_snowflake("１２３４５６７８９０１２３４５６７８"));
        assert_eq!(
            parse_webhook_url("https://discord.com/api/webhooks/123456789012345678/токен"),
            None
        );
        assert_eq!(
            parse_webhook_url("https://discord.com/api/webhooks/١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦٧٨/abc"),
            None
        );
        assert_eq!(
            require_snowflake("Channel ID", "١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦٧٨"),
            Err(ValidationError::Snowflake("Channel ID"))
        );
    }

    #[test]
    fn webhook_url_rejects_other_shapes() {
        assert_eq!(parse_webhook_url("http://discord.com/api/webhooks/123456789012345678/abc"), None);
        assert_eq!(parse_webhook_url("https://discord.com/api/webhooks/123/abc"), None);
        assert_eq!(parse_webhook_url("https://discord.com/api/webhooks/123456789012345678/"), None);
        assert_eq!(parse_webhook_url("garbage"), None);
    }

    #[test]
    fn require_webhook_url_distinguishes_missing_from_malformed() {
        assert_eq!(
            require_webhook_url("Webhook URL", "  "),
            Err(ValidationError::Missing("Webhook URL"))
        );
        assert_eq!(
            require_webhook_url("Webhook URL", "https://example.com/hook"),
            Err(ValidationError::WebhookUrl("Webhook URL"))
        );
        let parts = require_webhook_url(
            "Webhook URL",
            " https://discord.com/api/webhooks/123456789012345678/tok ",
        )
        .unwrap();
        assert_eq!(parts.token, "tok");
    }

    #[test]
    fn sanitize_trims_and_caps() {
        assert_eq!(sanitize_input("  hello  ", 3), "hel");
        assert_eq!(sanitize_input("ok", DEFAULT_MAX_INPUT_LEN), "ok");
    }

    #[test]
    fn avatar_url_variants() {
        assert_eq!(
            avatar_url("80351110224678912", Some("a_abc"), 128),
            "https://cdn.discordapp.com/avatars/80351110224678912/a_abc.gif?size=128"
        );
        assert_eq!(
            avatar_url("80351110224678912", Some("abc"), 64),
            "https://cdn.discordapp.com/avatars/80351110224678912/abc.png?size=64"
        );
        let expected = (80351110224678912u64 >> 22) % 6;
        assert_eq!(
            avatar_url("80351110224678912", None, 128),
            format!("https://cdn.discordapp.com/embed/avatars/{}.png", expected)
        );
    }

    #[test]
    fn range_check_reports_bounds() {
        assert_eq!(require_range("Limit", "50", 1, 100), Ok(50));
        assert_eq!(
            require_range("Limit", "0", 1, 100),
            Err(ValidationError::OutOfRange {
                field: "Limit",
                min: 1,
                max: 100
            })
        );
        assert_eq!(
            require_range("Limit", "many", 1, 100),
            Err(ValidationError::NotANumber("Limit"))
        );
    }

    #[test]
    fn require_helpers_distinguish_missing_from_malformed() {
        assert_eq!(require_credential(" "), Err(ValidationError::Missing("Credential")));
        assert_eq!(require_credential("short"), Err(ValidationError::CredentialShape));
        assert_eq!(
            require_snowflake("Channel ID", "12"),
            Err(ValidationError::Snowflake("Channel ID"))
        );
    }
}
