use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::setting::Setting;
use crate::errors::StoreError;

/// Per-user key/value settings keyed by `(user, name)`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings of `user` ordered by name.
    async fn list(&self, user: &str) -> Result<Vec<Setting>, StoreError>;
    async fn get(&self, user: &str, name: &str) -> Result<Option<Setting>, StoreError>;
    /// Inserts or replaces the value stored under `(user, name)`.
    async fn set(&self, user: &str, name: &str, value: &str) -> Result<Setting, StoreError>;
    /// Returns `false` when nothing was stored under `(user, name)`.
    async fn remove(&self, user: &str, name: &str) -> Result<bool, StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemorySettingsStore {
    settings: Arc<Mutex<Vec<Setting>>>,
}

impl InMemorySettingsStore {
    fn with_settings<T>(&self, f: impl FnOnce(&mut Vec<Setting>) -> T) -> T {
        match self.settings.lock() {
            Ok(mut settings) => f(&mut settings),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn list(&self, user: &str) -> Result<Vec<Setting>, StoreError> {
        Ok(self.with_settings(|settings| {
            let mut owned: Vec<Setting> =
                settings.iter().filter(|setting| setting.user == user).cloned().collect();
            owned.sort_by(|left, right| left.name.cmp(&right.name));
            owned
        }))
    }

    async fn get(&self, user: &str, name: &str) -> Result<Option<Setting>, StoreError> {
        Ok(self.with_settings(|settings| {
            settings.iter().find(|setting| setting.user == user && setting.name == name).cloned()
        }))
    }

    async fn set(&self, user: &str, name: &str, value: &str) -> Result<Setting, StoreError> {
        Ok(self.with_settings(|settings| {
            if let Some(existing) =
                settings.iter_mut().find(|setting| setting.user == user && setting.name == name)
            {
                existing.value = value.to_owned();
                return existing.clone();
            }
            let setting =
                Setting { user: user.to_owned(), name: name.to_owned(), value: value.to_owned() };
            settings.push(setting.clone());
            setting
        }))
    }

    async fn remove(&self, user: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.with_settings(|settings| {
            let before = settings.len();
            settings.retain(|setting| !(setting.user == user && setting.name == name));
            settings.len() != before
        }))
    }
}
