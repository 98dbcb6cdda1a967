use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest value rendered unmasked.
pub const MASK_THRESHOLD: usize = 10;

/// Render `first6...last4` for anything longer than ten characters, the trimmed value otherwise.
pub fn mask(raw: &str) -> String {
    let trimmed = raw.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= MASK_THRESHOLD {
        return trimmed.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// An opaque bearer token, always stored trimmed.
///
/// SECURITY: `Debug` and `Display` only ever show the mask.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Trim and wrap; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Credential(trimmed.to_string()))
        }
    }

    /// The raw secret. Use only when handing the credential to a backend call.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn mask(&self) -> String {
        mask(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.mask())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mask())
    }
}

/// Account details resolved lazily from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub avatar_url: String,
}

/// One row of the vault as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub index: usize,
    pub mask: String,
    pub label: Option<String>,
    pub profile: Option<Profile>,
    pub active: bool,
}

impl CredentialEntry {
    /// `label · mask` when labelled, the bare mask otherwise.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{} · {}", label, self.mask),
            None => self.mask.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_are_not_masked() {
        assert_eq!(mask("short"), "short");
        assert_eq!(mask("  0123456789  "), "0123456789");
    }

    #[test]
    fn long_values_show_first_six_and_last_four() {
        assert_eq!(mask("abcdefghijklmnopqrstuvwxyz"), "abcdef...wxyz");
        assert_eq!(mask("01234567890"), "012345...7890");
    }

    #[test]
    fn mask_operates_on_trimmed_value() {
        assert_eq!(mask("   abcdefghijklmnopqrstuvwxyz\n"), "abcdef...wxyz");
    }

    #[test]
    fn parse_trims_and_rejects_blank() {
        assert_eq!(Credential::parse("  tok  ").unwrap().expose(), "tok");
        assert!(Credential::parse("   ").is_none());
        assert!(Credential::parse("").is_none());
    }

    #[test]
    fn debug_output_never_leaks_raw_value() {
        let cred = Credential::parse("abcdefghijklmnopqrstuvwxyz").unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("ghijklmnop"));
        assert!(debug.contains("abcdef...wxyz"));
        assert_eq!(cred.to_string(), "abcdef...wxyz");
    }

    #[test]
    fn entry_display_name_prefers_label() {
        let entry = CredentialEntry {
            index: 0,
            mask: "abcdef...wxyz".to_string(),
            label: Some("main".to_string()),
            profile: None,
            active: true,
        };
        assert_eq!(entry.display_name(), "main · abcdef...wxyz");
    }
}
