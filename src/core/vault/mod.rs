//! Encrypted multi-credential store with a single active selection.
//!
//! Every mutation updates memory first and then persists through the cipher. Persistence is
//! best effort: failures are logged and never roll back the in-memory state.

pub mod credential;
mod shared;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::cipher::Cipher;
use crate::core::storage::KeyValueStore;

pub use credential::{Credential, CredentialEntry, Profile, mask};
pub use shared::SharedVault;

pub const ACTIVE_KEY: &str = "tokendeck_active_token";
pub const TOKENS_KEY: &str = "tokendeck_tokens";
pub const LABELS_KEY: &str = "tokendeck_token_labels";
pub const PROFILES_KEY: &str = "tokendeck_token_profiles";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("Invalid credential: value is empty")]
    InvalidCredential,
}

#[derive(Serialize, Deserialize)]
struct LabelRecord {
    token: String,
    label: String,
}

#[derive(Serialize, Deserialize)]
struct ProfileRecord {
    token: String,
    username: String,
    #[serde(rename = "avatarUrl", default)]
    avatar_url: String,
}

pub struct CredentialVault {
    store: Arc<dyn KeyValueStore>,
    cipher: Arc<Cipher>,
    tokens: Vec<Credential>,
    active: Option<Credential>,
    labels: HashMap<Credential, String>,
    profiles: HashMap<Credential, Profile>,
}

impl CredentialVault {
    /// Load persisted state once at startup and reconcile the active pointer with the list.
    pub fn hydrate(store: Arc<dyn KeyValueStore>, cipher: Arc<Cipher>) -> Self {
        let mut vault = Self {
            store,
            cipher,
            tokens: Vec::new(),
            active: None,
            labels: HashMap::new(),
            profiles: HashMap::new(),
        };

        vault.tokens = vault.load_token_list();
        vault.active = vault
            .read(ACTIVE_KEY)
            .and_then(|encrypted| Credential::parse(&vault.cipher.decrypt_str(&encrypted)));
        vault.labels = vault.load_labels();
        vault.profiles = vault.load_profiles();

        match vault.active.clone() {
            Some(active) if !vault.tokens.contains(&active) => {
                debug!("Active credential {} missing from list, restoring it", active);
                vault.tokens.insert(0, active);
            }
            None if !vault.tokens.is_empty() => {
                let first = vault.tokens[0].clone();
                info!("No active credential stored, selecting {}", first);
                vault.active = Some(first);
                vault.persist_active();
            }
            _ => {}
        }

        info!("Vault hydrated with {} credential(s)", vault.tokens.len());
        vault
    }

    pub fn tokens(&self) -> &[Credential] {
        &self.tokens
    }

    pub fn active(&self) -> Option<&Credential> {
        self.active.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Credential> {
        self.tokens.get(index)
    }

    pub fn label(&self, credential: &Credential) -> Option<&str> {
        self.labels.get(credential).map(String::as_str)
    }

    pub fn profile(&self, credential: &Credential) -> Option<&Profile> {
        self.profiles.get(credential)
    }

    pub fn entries(&self) -> Vec<CredentialEntry> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(index, token)| CredentialEntry {
                index,
                mask: token.mask(),
                label: self.labels.get(token).cloned(),
                profile: self.profiles.get(token).cloned(),
                active: self.active.as_ref() == Some(token),
            })
            .collect()
    }

    /// Store a credential entered by the user and make it active.
    pub fn add(&mut self, raw: &str) -> Result<Credential, VaultError> {
        let credential = Credential::parse(raw).ok_or(VaultError::InvalidCredential)?;
        self.promote(credential.clone());
        info!("Saved credential {}", credential);
        Ok(credential)
    }

    /// Mark a credential as active, storing it first if it is new. Blank input is ignored.
    pub fn select_active(&mut self, raw: &str) -> Option<Credential> {
        let credential = Credential::parse(raw)?;
        self.promote(credential.clone());
        debug!("Selected credential {}", credential);
        Some(credential)
    }

    fn promote(&mut self, credential: Credential) {
        self.tokens.retain(|t| t != &credential);
        self.tokens.insert(0, credential.clone());
        self.active = Some(credential);
        self.persist_tokens();
        self.persist_active();
    }

    /// Returns whether the credential was present.
    pub fn remove(&mut self, raw: &str) -> bool {
        let Some(credential) = Credential::parse(raw) else {
            return false;
        };
        let before = self.tokens.len();
        self.tokens.retain(|t| t != &credential);
        let removed = self.tokens.len() != before;

        if self.labels.remove(&credential).is_some() {
            self.persist_labels();
        }
        if self.profiles.remove(&credential).is_some() {
            self.persist_profiles();
        }

        if self.tokens.is_empty() {
            self.active = None;
            self.erase(ACTIVE_KEY);
            self.erase(TOKENS_KEY);
            info!("Removed credential {}, vault is now empty", credential);
            return removed;
        }

        self.persist_tokens();
        if self.active.as_ref() == Some(&credential) {
            self.active = self.tokens.first().cloned();
            self.persist_active();
        }
        if removed {
            info!("Removed credential {}", credential);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.active = None;
        self.labels.clear();
        self.profiles.clear();
        for key in [ACTIVE_KEY, TOKENS_KEY, LABELS_KEY, PROFILES_KEY] {
            self.erase(key);
        }
        info!("Cleared all stored credentials");
    }

    /// A blank label removes the existing one.
    pub fn set_label(&mut self, raw: &str, label: &str) {
        let Some(credential) = Credential::parse(raw) else {
            return;
        };
        let label = label.trim();
        if label.is_empty() {
            self.labels.remove(&credential);
        } else {
            self.labels.insert(credential, label.to_string());
        }
        self.persist_labels();
    }

    pub fn set_profile(&mut self, raw: &str, profile: Profile) {
        let Some(credential) = Credential::parse(raw) else {
            return;
        };
        self.profiles.insert(credential, profile);
        self.persist_profiles();
    }

    /// Merge a batch of credentials after the existing ones, keeping the current selection.
    pub fn import(
        &mut self,
        tokens: &[String],
        labels: &HashMap<String, String>,
        profiles: &HashMap<String, Profile>,
    ) -> usize {
        let incoming: Vec<Credential> = tokens.iter().filter_map(|t| Credential::parse(t)).collect();
        if incoming.is_empty() {
            return 0;
        }

        let mut added = 0;
        for credential in incoming {
            if !self.tokens.contains(&credential) {
                self.tokens.push(credential);
                added += 1;
            }
        }
        self.persist_tokens();

        if self.active.is_none() {
            self.active = self.tokens.first().cloned();
        }
        self.persist_active();

        for (token, label) in labels {
            if let Some(credential) = Credential::parse(token)
                && !label.trim().is_empty()
            {
                self.labels.insert(credential, label.trim().to_string());
            }
        }
        self.persist_labels();

        for (token, profile) in profiles {
            if let Some(credential) = Credential::parse(token)
                && !profile.display_name.is_empty()
            {
                self.profiles.insert(credential, profile.clone());
            }
        }
        self.persist_profiles();

        info!("Imported {} new credential(s)", added);
        added
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read '{}' from storage: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("Failed to persist '{}': {}", key, e);
        }
    }

    fn erase(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("Failed to erase '{}': {}", key, e);
        }
    }

    fn load_token_list(&self) -> Vec<Credential> {
        let Some(raw) = self.read(TOKENS_KEY) else {
            return Vec::new();
        };
        let encrypted: Vec<String> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!("Stored credential list is malformed, ignoring it: {}", e);
                return Vec::new();
            }
        };

        let mut tokens = Vec::new();
        for entry in encrypted {
            let opened = self.cipher.open(&entry);
            if !opened.was_decrypted() {
                debug!("Credential list entry was stored unencrypted");
            }
            if let Some(credential) = Credential::parse(&opened.into_inner())
                && !tokens.contains(&credential)
            {
                tokens.push(credential);
            }
        }
        tokens
    }

    fn load_labels(&self) -> HashMap<Credential, String> {
        let Some(raw) = self.read(LABELS_KEY) else {
            return HashMap::new();
        };
        match serde_json::from_str::<Vec<LabelRecord>>(&raw) {
            Ok(records) => records
                .into_iter()
                .filter_map(|r| {
                    let credential = Credential::parse(&self.cipher.decrypt_str(&r.token))?;
                    Some((credential, r.label))
                })
                .collect(),
            Err(e) => {
                warn!("Stored credential labels are malformed, ignoring them: {}", e);
                HashMap::new()
            }
        }
    }

    fn load_profiles(&self) -> HashMap<Credential, Profile> {
        let Some(raw) = self.read(PROFILES_KEY) else {
            return HashMap::new();
        };
        match serde_json::from_str::<Vec<ProfileRecord>>(&raw) {
            Ok(records) => records
                .into_iter()
                .filter_map(|r| {
                    let credential = Credential::parse(&self.cipher.decrypt_str(&r.token))?;
                    Some((
                        credential,
                        Profile {
                            display_name: r.username,
                            avatar_url: r.avatar_url,
                        },
                    ))
                })
                .collect(),
            Err(e) => {
                warn!("Stored credential profiles are malformed, ignoring them: {}", e);
                HashMap::new()
            }
        }
    }

    fn persist_tokens(&self) {
        let encrypted: Vec<String> = self
            .tokens
            .iter()
            .map(|t| self.cipher.encrypt_str(t.expose()))
            .collect();
        match serde_json::to_string(&encrypted) {
            Ok(json) => self.write(TOKENS_KEY, &json),
            Err(e) => warn!("Failed to serialize credential list: {}", e),
        }
    }

    fn persist_active(&self) {
        match &self.active {
            Some(active) => self.write(ACTIVE_KEY, &self.cipher.encrypt_str(active.expose())),
            None => self.erase(ACTIVE_KEY),
        }
    }

    fn persist_labels(&self) {
        let records: Vec<LabelRecord> = self
            .labels
            .iter()
            .map(|(token, label)| LabelRecord {
                token: self.cipher.encrypt_str(token.expose()),
                label: label.clone(),
            })
            .collect();
        match serde_json::to_string(&records) {
            Ok(json) => self.write(LABELS_KEY, &json),
            Err(e) => warn!("Failed to serialize credential labels: {}", e),
        }
    }

    fn persist_profiles(&self) {
        let records: Vec<ProfileRecord> = self
            .profiles
            .iter()
            .map(|(token, profile)| ProfileRecord {
                token: self.cipher.encrypt_str(token.expose()),
                username: profile.display_name.clone(),
                avatar_url: profile.avatar_url.clone(),
            })
            .collect();
        match serde_json::to_string(&records) {
            Ok(json) => self.write(PROFILES_KEY, &json),
            Err(e) => warn!("Failed to serialize credential profiles: {}", e),
        }
    }
}
