use serde_json::{Value, json};

use crate::core::backend::{Backend, BackendError};
use crate::core::validation::avatar_url;
use crate::core::vault::{Credential, Profile, SharedVault};

pub const TOKEN_INFO_COMMAND: &str = "get_token_info";
const AVATAR_SIZE: u32 = 128;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Token info is missing or invalid: {0}")]
    Malformed(String),
}

/// Account details returned by `get_token_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub verified: bool,
    pub mfa_enabled: bool,
    pub premium_type: u64,
    pub bot: bool,
    pub avatar_url: String,
}

impl TokenInfo {
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        let json: Value = serde_json::from_str(raw)
            .map_err(|e| ProfileError::Malformed(format!("could not parse response: {}", e)))?;
        if !json.is_object() {
            return Err(ProfileError::Malformed("expected an object".into()));
        }

        let text = |key: &str| json.get(key).and_then(|v| v.as_str()).map(String::from);
        let id = text("id")
            .or_else(|| text("user_id"))
            .ok_or_else(|| ProfileError::Malformed("no user id".into()))?;
        let base = text("username").ok_or_else(|| ProfileError::Malformed("no username".into()))?;
        let username = match text("discriminator") {
            Some(disc) if disc != "0" => format!("{}#{}", base, disc),
            _ => base,
        };
        let flag = |key: &str| json.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

        Ok(Self {
            avatar_url: avatar_url(&id, text("avatar").as_deref(), AVATAR_SIZE),
            id,
            username,
            email: text("email"),
            verified: flag("verified"),
            mfa_enabled: flag("mfa_enabled"),
            premium_type: json.get("premium_type").and_then(|v| v.as_u64()).unwrap_or(0),
            bot: flag("bot"),
        })
    }

    pub fn premium_label(&self) -> &'static str {
        match self.premium_type {
            1 => "Nitro Classic",
            2 => "Nitro",
            3 => "Nitro Basic",
            _ => "None",
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            display_name: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Fetch account details for `credential` and cache its profile in the vault.
pub async fn resolve_profile(
    backend: &dyn Backend,
    vault: &SharedVault,
    credential: &Credential,
) -> Result<TokenInfo, ProfileError> {
    let args = json!({ "userToken": credential.expose() });
    let outcome = backend.invoke(TOKEN_INFO_COMMAND, args, None).await?;
    let info = TokenInfo::parse(&outcome.message)?;
    vault.set_profile(credential.expose(), info.profile());
    Ok(info)
}
