//! Fixture state shared by the scenarios of one module

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{BookDraft, Credentials};

/// Named slot in a [`FixtureStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKey {
    Email,
    Password,
    PasswordConfirmation,
    AccessToken,
    UserId,
    BookId,
    BookTitle,
    BookDescription,
    BookImageUrl,
    BookType,
}

impl FixtureKey {
    /// Keys populated when a module starts
    pub const SEEDED: [FixtureKey; 7] = [
        FixtureKey::Email,
        FixtureKey::Password,
        FixtureKey::PasswordConfirmation,
        FixtureKey::BookTitle,
        FixtureKey::BookDescription,
        FixtureKey::BookImageUrl,
        FixtureKey::BookType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureKey::Email => "email",
            FixtureKey::Password => "password",
            FixtureKey::PasswordConfirmation => "password_confirmation",
            FixtureKey::AccessToken => "access_token",
            FixtureKey::UserId => "user_id",
            FixtureKey::BookId => "book_id",
            FixtureKey::BookTitle => "book_title",
            FixtureKey::BookDescription => "book_description",
            FixtureKey::BookImageUrl => "book_image_url",
            FixtureKey::BookType => "book_type",
        }
    }
}

impl fmt::Display for FixtureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable fixture state for a single module run.
///
/// Not persisted and not shared across modules. The orchestrator is the only
/// writer and runs scenarios strictly in order, so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    values: BTreeMap<FixtureKey, String>,
}

impl FixtureStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh store holding the module's credentials and book draft
    pub fn seeded(credentials: &Credentials, book: &BookDraft) -> Self {
        let mut store = Self::new();
        store.set(FixtureKey::Email, &credentials.email);
        store.set(FixtureKey::Password, &credentials.password);
        store.set(FixtureKey::PasswordConfirmation, &credentials.password_confirmation);
        store.set(FixtureKey::BookTitle, &book.title);
        store.set(FixtureKey::BookDescription, &book.description);
        store.set(FixtureKey::BookImageUrl, &book.image_url);
        store.set(FixtureKey::BookType, &book.book_type);
        store
    }

    pub fn get(&self, key: FixtureKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats absent or empty values as an error
    pub fn require(&self, key: FixtureKey) -> HarnessResult<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(HarnessError::MissingFixture(key)),
        }
    }

    /// Overwrite a value, returning the previous one. Last writer wins.
    pub fn set(&mut self, key: FixtureKey, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        let previous = self.values.insert(key, value);

        if key == FixtureKey::AccessToken {
            if let (Some(old), Some(new)) = (previous.as_deref(), self.get(key)) {
                if old != new {
                    debug!("Access token rotated");
                }
            }
        }

        previous
    }

    /// Keys from `keys` that are absent or empty
    pub fn missing(&self, keys: &[FixtureKey]) -> Vec<FixtureKey> {
        keys.iter()
            .copied()
            .filter(|k| self.require(*k).is_err())
            .collect()
    }

    /// Copy of the current values, with the token redacted
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if *k == FixtureKey::AccessToken {
                    format!("<{} chars>", v.len())
                } else {
                    v.clone()
                };
                (k.to_string(), shown)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BookTemplate, CredentialTemplate, UniqueGenerator};

    fn seeded() -> FixtureStore {
        let generator = UniqueGenerator::with_tag("s");
        let creds = Credentials::generate(&generator, &CredentialTemplate::default());
        let book = BookDraft::generate(&generator, &BookTemplate::default());
        FixtureStore::seeded(&creds, &book)
    }

    #[test]
    fn test_seeded_store_has_only_seed_keys() {
        let store = seeded();
        for key in FixtureKey::SEEDED {
            assert!(store.get(key).is_some(), "{key} should be seeded");
        }
        assert!(store.get(FixtureKey::AccessToken).is_none());
        assert!(store.get(FixtureKey::UserId).is_none());
        assert!(store.get(FixtureKey::BookId).is_none());
    }

    #[test]
    fn test_set_is_last_writer_wins() {
        let mut store = seeded();
        assert_eq!(store.set(FixtureKey::AccessToken, "first"), None);
        assert_eq!(
            store.set(FixtureKey::AccessToken, "second").as_deref(),
            Some("first")
        );
        assert_eq!(store.get(FixtureKey::AccessToken), Some("second"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut store = seeded();
        store.set(FixtureKey::AccessToken, "");
        assert!(store.require(FixtureKey::AccessToken).is_err());
        assert_eq!(
            store.missing(&[FixtureKey::Email, FixtureKey::AccessToken, FixtureKey::BookId]),
            vec![FixtureKey::AccessToken, FixtureKey::BookId]
        );
    }

    #[test]
    fn test_snapshot_redacts_token() {
        let mut store = seeded();
        store.set(FixtureKey::AccessToken, "secret-token");
        let snapshot = store.snapshot();
        assert_eq!(snapshot["access_token"], "<12 chars>");
        assert!(snapshot["email"].contains('@'));
    }
}
