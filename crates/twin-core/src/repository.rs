//! Persistence contract consumed by the display policy.
//!
//! The core never touches storage directly; hosts hand the policy something
//! implementing [`Repository`]. [`MemoryRepository`] backs tests and
//! throwaway sessions.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::TokenRecord;
use crate::time::timestamp_now;

/// Identifier assigned to a record on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// An archived record with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record: TokenRecord,
    pub created_at: String,
}

/// One member of the de-dup set. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayedEntry {
    pub contract_address: String,
    pub token_name: String,
    pub similarity: f64,
    pub displayed_at: String,
}

/// Corpus, settings and de-dup set storage.
pub trait Repository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn insert(&self, record: &TokenRecord) -> Result<RecordId, Self::Error>;

    fn list_all(&self) -> Result<Vec<TokenRecord>, Self::Error>;

    /// Oldest archived record carrying `contract_address`, if any.
    fn find_by_contract(&self, contract_address: &str)
    -> Result<Option<StoredRecord>, Self::Error>;

    fn get_setting(&self, key: &str, default: &str) -> Result<String, Self::Error>;

    fn set_setting(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    fn is_displayed(&self, contract_address: &str) -> Result<bool, Self::Error>;

    /// Add to the de-dup set. An existing entry is left untouched and
    /// `false` is returned; `true` means this call created the entry.
    fn mark_displayed(
        &self,
        contract_address: &str,
        token_name: &str,
        similarity: f64,
    ) -> Result<bool, Self::Error>;

    /// Empty the de-dup set, returning how many entries were removed.
    fn clear_displayed(&self) -> Result<usize, Self::Error>;
}

impl<T: Repository + ?Sized> Repository for &T {
    type Error = T::Error;

    fn insert(&self, record: &TokenRecord) -> Result<RecordId, Self::Error> {
        (**self).insert(record)
    }

    fn list_all(&self) -> Result<Vec<TokenRecord>, Self::Error> {
        (**self).list_all()
    }

    fn find_by_contract(
        &self,
        contract_address: &str,
    ) -> Result<Option<StoredRecord>, Self::Error> {
        (**self).find_by_contract(contract_address)
    }

    fn get_setting(&self, key: &str, default: &str) -> Result<String, Self::Error> {
        (**self).get_setting(key, default)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        (**self).set_setting(key, value)
    }

    fn is_displayed(&self, contract_address: &str) -> Result<bool, Self::Error> {
        (**self).is_displayed(contract_address)
    }

    fn mark_displayed(
        &self,
        contract_address: &str,
        token_name: &str,
        similarity: f64,
    ) -> Result<bool, Self::Error> {
        (**self).mark_displayed(contract_address, token_name, similarity)
    }

    fn clear_displayed(&self) -> Result<usize, Self::Error> {
        (**self).clear_displayed()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<StoredRecord>,
    settings: Vec<(String, String)>,
    displayed: Vec<DisplayedEntry>,
}

/// Process-local repository. Cannot fail.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// De-dup set entries in insertion order.
    pub fn displayed(&self) -> Vec<DisplayedEntry> {
        self.lock().displayed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the vectors half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Repository for MemoryRepository {
    type Error = Infallible;

    fn insert(&self, record: &TokenRecord) -> Result<RecordId, Infallible> {
        let id = RecordId::new();
        self.lock().records.push(StoredRecord {
            id,
            record: record.clone(),
            created_at: timestamp_now(),
        });
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<TokenRecord>, Infallible> {
        Ok(self.lock().records.iter().map(|s| s.record.clone()).collect())
    }

    fn find_by_contract(&self, contract_address: &str) -> Result<Option<StoredRecord>, Infallible> {
        Ok(self
            .lock()
            .records
            .iter()
            .find(|s| s.record.contract_address.as_deref() == Some(contract_address))
            .cloned())
    }

    fn get_setting(&self, key: &str, default: &str) -> Result<String, Infallible> {
        Ok(self
            .lock()
            .settings
            .iter()
            .find(|(k, _)| k == key)
            .map_or_else(|| default.to_string(), |(_, v)| v.clone()))
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), Infallible> {
        let mut state = self.lock();
        match state.settings.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => state.settings.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn is_displayed(&self, contract_address: &str) -> Result<bool, Infallible> {
        Ok(self
            .lock()
            .displayed
            .iter()
            .any(|e| e.contract_address == contract_address))
    }

    fn mark_displayed(
        &self,
        contract_address: &str,
        token_name: &str,
        similarity: f64,
    ) -> Result<bool, Infallible> {
        let mut state = self.lock();
        if state
            .displayed
            .iter()
            .any(|e| e.contract_address == contract_address)
        {
            return Ok(false);
        }
        state.displayed.push(DisplayedEntry {
            contract_address: contract_address.to_string(),
            token_name: token_name.to_string(),
            similarity,
            displayed_at: timestamp_now(),
        });
        Ok(true)
    }

    fn clear_displayed(&self) -> Result<usize, Infallible> {
        let mut state = self.lock();
        let count = state.displayed.len();
        state.displayed.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let repo = MemoryRepository::new();
        let a = repo.insert(&TokenRecord::new("a", Some("CA1"))).unwrap();
        let b = repo.insert(&TokenRecord::new("b", None)).unwrap();
        assert_ne!(a, b);
        let names: Vec<String> = repo.list_all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_find_by_contract() {
        let repo = MemoryRepository::new();
        let id = repo.insert(&TokenRecord::new("a", Some("CA1"))).unwrap();
        let found = repo.find_by_contract("CA1").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.record.name, "a");
        assert!(repo.find_by_contract("CA2").unwrap().is_none());
    }

    #[test]
    fn test_settings_default_and_overwrite() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.get_setting("k", "70.0").unwrap(), "70.0");
        repo.set_setting("k", "55").unwrap();
        repo.set_setting("k", "60").unwrap();
        assert_eq!(repo.get_setting("k", "70.0").unwrap(), "60");
    }

    #[test]
    fn test_mark_displayed_is_write_once() {
        let repo = MemoryRepository::new();
        assert!(repo.mark_displayed("CA1", "first", 80.0).unwrap());
        assert!(!repo.mark_displayed("CA1", "second", 99.0).unwrap());
        let entries = repo.displayed();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].token_name, "first");
        assert_eq!(entries[0].similarity, 80.0);
    }

    #[test]
    fn test_clear_displayed_counts() {
        let repo = MemoryRepository::new();
        repo.mark_displayed("CA1", "a", 80.0).unwrap();
        repo.mark_displayed("CA2", "b", 90.0).unwrap();
        assert_eq!(repo.clear_displayed().unwrap(), 2);
        assert!(!repo.is_displayed("CA1").unwrap());
        assert_eq!(repo.clear_displayed().unwrap(), 0);
    }

    #[test]
    fn test_record_id_parses_display_form() {
        let id = RecordId::new();
        assert_eq!(id.to_string().parse::<RecordId>().unwrap(), id);
        assert!("42".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_reference_is_repository() {
        fn count<R: Repository>(repo: R) -> usize {
            repo.list_all().map(|v| v.len()).unwrap_or_default()
        }
        let repo = MemoryRepository::new();
        repo.insert(&TokenRecord::new("a", None)).unwrap();
        assert_eq!(count(&repo), 1);
    }
}
