use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use uuid::Uuid;

use twin_core::{DisplayedEntry, RecordId, Repository, StoredRecord, TokenRecord};

use crate::error::{Result, StoreError};
use crate::schema;

/// File name of the database inside a data directory.
pub const DATABASE_FILE: &str = "twin.db";

pub struct Store {
    conn: Connection,
}

/// A corpus row as listed for administration. `seq` is its archive number,
/// the value `delete_range` selects on.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedToken {
    pub seq: i64,
    pub stored: StoredRecord,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open `<dir>/twin.db`, creating the directory if needed.
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", dir.display()))
        })?;
        Self::open(&dir.join(DATABASE_FILE))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Corpus ---

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Newest records first. Undecodable rows are skipped with a warning.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<ArchivedToken>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, indicators, created_at, rowid FROM tokens ORDER BY rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| Ok((raw_stored(row)?, row.get::<_, i64>(3)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(raw, seq)| {
                decode_or_skip(raw).map(|stored| ArchivedToken { seq, stored })
            })
            .collect())
    }

    /// `(name, contract_address)` for every record with an address, by name.
    pub fn list_contracts(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, contract_address FROM tokens
             WHERE contract_address IS NOT NULL AND contract_address != ''
             ORDER BY name, rowid",
        )?;
        let contracts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contracts)
    }

    /// Delete every archived record carrying `contract_address`. Returns the
    /// number removed and their names.
    pub fn delete_by_contract(&self, contract_address: &str) -> Result<(usize, Vec<String>)> {
        let (deleted, names) =
            self.delete_where("contract_address = ?1", params![contract_address])?;
        if deleted > 0 {
            tracing::info!(contract_address, deleted, "deleted archived records");
        }
        Ok((deleted, names))
    }

    /// Delete one record by id. Returns its name if it existed.
    pub fn delete_by_id(&self, id: &RecordId) -> Result<Option<String>> {
        let id = id.to_string();
        let (_, names) = self.delete_where("id = ?1", params![id])?;
        if let Some(name) = names.first() {
            tracing::info!(id, name, "deleted archived record");
        }
        Ok(names.into_iter().next())
    }

    /// Delete every record named exactly `name`. Returns how many went.
    pub fn delete_by_name(&self, name: &str) -> Result<usize> {
        let (deleted, _) = self.delete_where("name = ?1", params![name])?;
        if deleted > 0 {
            tracing::info!(name, deleted, "deleted archived records");
        }
        Ok(deleted)
    }

    /// Delete the most recently archived record. Returns its name, or `None`
    /// when the corpus is empty.
    pub fn delete_last(&self) -> Result<Option<String>> {
        let (_, names) =
            self.delete_where("rowid = (SELECT MAX(rowid) FROM tokens)", params![])?;
        if let Some(name) = names.first() {
            tracing::info!(name, "deleted last archived record");
        }
        Ok(names.into_iter().next())
    }

    /// Delete records whose archive number lies in `first..=last`.
    pub fn delete_range(&self, first: i64, last: i64) -> Result<(usize, Vec<String>)> {
        let (deleted, names) =
            self.delete_where("rowid BETWEEN ?1 AND ?2", params![first, last])?;
        if deleted > 0 {
            tracing::info!(first, last, deleted, "deleted archived range");
        }
        Ok((deleted, names))
    }

    /// Empty the corpus. Settings and the de-dup set are kept.
    pub fn clear_all(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM tokens", [])?;
        tracing::info!(deleted, "cleared archive");
        Ok(deleted)
    }

    /// Names of the rows matching `filter` (oldest first), then delete them,
    /// in one transaction.
    fn delete_where<P>(&self, filter: &str, params: P) -> Result<(usize, Vec<String>)>
    where
        P: Params + Copy,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut stmt =
            tx.prepare(&format!("SELECT name FROM tokens WHERE {filter} ORDER BY rowid"))?;
        let names: Vec<String> = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        let deleted = tx.execute(&format!("DELETE FROM tokens WHERE {filter}"), params)?;
        tx.commit()?;
        Ok((deleted, names))
    }

    // --- De-dup set ---

    pub fn displayed_count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM displayed_contracts",
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Most recently displayed first.
    pub fn list_displayed(&self) -> Result<Vec<DisplayedEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT contract_address, token_name, similarity, displayed_at
             FROM displayed_contracts ORDER BY displayed_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(DisplayedEntry {
                    contract_address: row.get(0)?,
                    token_name: row.get(1)?,
                    similarity: row.get(2)?,
                    displayed_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Fold the WAL into the main database file.
    pub fn checkpoint(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        tracing::info!("WAL checkpoint complete");
        Ok(())
    }
}

impl Repository for Store {
    type Error = StoreError;

    fn insert(&self, record: &TokenRecord) -> Result<RecordId> {
        let id = RecordId::new();
        let indicators = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO tokens (id, name, contract_address, raw_text, indicators)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                record.name,
                record.contract_address,
                record.raw_text,
                indicators,
            ],
        )?;
        Ok(id)
    }

    /// Every decodable record in insertion order. Undecodable rows are
    /// skipped with a warning.
    fn list_all(&self) -> Result<Vec<TokenRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, indicators, created_at FROM tokens ORDER BY rowid")?;
        let rows = stmt
            .query_map([], raw_stored)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(decode_or_skip)
            .map(|stored| stored.record)
            .collect())
    }

    fn find_by_contract(&self, contract_address: &str) -> Result<Option<StoredRecord>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, indicators, created_at FROM tokens
                 WHERE contract_address = ?1 ORDER BY rowid LIMIT 1",
                [contract_address],
                raw_stored,
            )
            .optional()?;
        raw.map(decode_stored).transpose()
    }

    fn get_setting(&self, key: &str, default: &str) -> Result<String> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    fn is_displayed(&self, contract_address: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM displayed_contracts WHERE contract_address = ?1",
                [contract_address],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// The primary key decides between concurrent writers: only the
    /// insert that lands reports `true`.
    fn mark_displayed(
        &self,
        contract_address: &str,
        token_name: &str,
        similarity: f64,
    ) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO displayed_contracts (contract_address, token_name, similarity)
             VALUES (?1, ?2, ?3)",
            params![contract_address, token_name, similarity],
        )?;
        Ok(inserted == 1)
    }

    fn clear_displayed(&self) -> Result<usize> {
        let cleared = self.conn.execute("DELETE FROM displayed_contracts", [])?;
        Ok(cleared)
    }
}

type RawStored = (String, String, String);

fn raw_stored(row: &Row<'_>) -> rusqlite::Result<RawStored> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_stored((id, json, created_at): RawStored) -> Result<StoredRecord> {
    Ok(StoredRecord {
        id: RecordId(parse_uuid(&id)?),
        record: serde_json::from_str(&json)?,
        created_at,
    })
}

fn decode_or_skip(raw: RawStored) -> Option<StoredRecord> {
    let id = raw.0.clone();
    match decode_stored(raw) {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "skipping undecodable token row");
            None
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
