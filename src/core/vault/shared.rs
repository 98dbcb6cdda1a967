use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::{Credential, CredentialEntry, CredentialVault, Profile, VaultError};

/// The process-wide vault handle injected into every panel.
///
/// Mutations go through this handle so that the active credential is republished to every
/// observer. Clones share the same state.
#[derive(Clone)]
pub struct SharedVault {
    inner: Arc<Mutex<CredentialVault>>,
    active_tx: Arc<watch::Sender<Option<Credential>>>,
}

impl SharedVault {
    pub fn new(vault: CredentialVault) -> Self {
        let (active_tx, _) = watch::channel(vault.active().cloned());
        Self {
            inner: Arc::new(Mutex::new(vault)),
            active_tx: Arc::new(active_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CredentialVault> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, vault: &CredentialVault) {
        let next = vault.active().cloned();
        self.active_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Observe changes of the active credential.
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.active_tx.subscribe()
    }

    pub fn active(&self) -> Option<Credential> {
        self.lock().active().cloned()
    }

    pub fn entries(&self) -> Vec<CredentialEntry> {
        self.lock().entries()
    }

    pub fn tokens(&self) -> Vec<Credential> {
        self.lock().tokens().to_vec()
    }

    pub fn get(&self, index: usize) -> Option<Credential> {
        self.lock().get(index).cloned()
    }

    pub fn profile(&self, credential: &Credential) -> Option<Profile> {
        self.lock().profile(credential).cloned()
    }

    pub fn add(&self, raw: &str) -> Result<Credential, VaultError> {
        let mut vault = self.lock();
        let added = vault.add(raw)?;
        self.publish(&vault);
        Ok(added)
    }

    pub fn select_active(&self, raw: &str) -> Option<Credential> {
        let mut vault = self.lock();
        let selected = vault.select_active(raw);
        self.publish(&vault);
        selected
    }

    pub fn remove(&self, raw: &str) -> bool {
        let mut vault = self.lock();
        let removed = vault.remove(raw);
        self.publish(&vault);
        removed
    }

    pub fn clear(&self) {
        let mut vault = self.lock();
        vault.clear();
        self.publish(&vault);
    }

    pub fn set_label(&self, raw: &str, label: &str) {
        self.lock().set_label(raw, label);
    }

    pub fn set_profile(&self, raw: &str, profile: Profile) {
        self.lock().set_profile(raw, profile);
    }

    pub fn import(
        &self,
        tokens: &[String],
        labels: &HashMap<String, String>,
        profiles: &HashMap<String, Profile>,
    ) -> usize {
        let mut vault = self.lock();
        let added = vault.import(tokens, labels, profiles);
        self.publish(&vault);
        added
    }
}
