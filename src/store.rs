//! ALFA Media Vault - Record Store
//!
//! Structured records in SQLite. Each collection keeps its records as bincode
//! payloads keyed by id, with declared secondary indexes materialized in a
//! separate table. Every public operation runs in its own transaction.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::model::AiConfig;

/// A named secondary index
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub unique: bool,
}

const CATEGORY_INDEXES: &[IndexSpec] = &[IndexSpec { name: "name", unique: true }];

const MEDIA_ITEM_INDEXES: &[IndexSpec] = &[
    IndexSpec { name: "categoryId", unique: false },
    IndexSpec { name: "type", unique: false },
    IndexSpec { name: "createdAt", unique: false },
    IndexSpec { name: "fileName", unique: false },
];

const AI_CONFIG_INDEXES: &[IndexSpec] = &[
    IndexSpec { name: "name", unique: true },
    IndexSpec { name: "isActive", unique: false },
];

/// The three record collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Categories,
    MediaItems,
    AiConfigs,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::MediaItems => "media_items",
            Collection::AiConfigs => "ai_configs",
        }
    }

    pub fn indexes(&self) -> &'static [IndexSpec] {
        match self {
            Collection::Categories => CATEGORY_INDEXES,
            Collection::MediaItems => MEDIA_ITEM_INDEXES,
            Collection::AiConfigs => AI_CONFIG_INDEXES,
        }
    }

    fn index(&self, name: &str) -> VaultResult<&'static IndexSpec> {
        self.indexes()
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| VaultError::UnknownIndex {
                collection: self.name(),
                index: name.to_string(),
            })
    }
}

/// A record that lives in one collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    /// Primary key
    fn id(&self) -> &str;

    /// `(index name, value)` for every declared index of the collection
    fn index_values(&self) -> Vec<(&'static str, String)>;
}

/// Record Store - SQLite-backed collections plus a small settings table
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) a store at `path`
    pub fn open(path: &Path) -> VaultResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a throwaway store
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> VaultResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE TABLE IF NOT EXISTS record_index (
                collection TEXT NOT NULL,
                index_name TEXT NOT NULL,
                value TEXT NOT NULL,
                record_id TEXT NOT NULL,
                PRIMARY KEY (collection, index_name, record_id)
            );

            CREATE INDEX IF NOT EXISTS idx_record_lookup
                ON record_index(collection, index_name, value);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RECORDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a new record. Fails on an existing id or unique index value.
    pub fn add<T: Record>(&self, record: &T) -> VaultResult<()> {
        let collection = T::COLLECTION;
        let data = bincode::serialize(record)?;
        let values = record.index_values();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE collection = ?1 AND id = ?2)",
            params![collection.name(), record.id()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(VaultError::DuplicateKey {
                collection: collection.name(),
                key: record.id().to_string(),
            });
        }

        check_unique(&tx, collection, record.id(), &values)?;

        tx.execute(
            "INSERT INTO records (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection.name(), record.id(), data],
        )?;
        write_index(&tx, collection, record.id(), &values)?;

        tx.commit()?;
        Ok(())
    }

    /// Insert or replace by primary key
    pub fn update<T: Record>(&self, record: &T) -> VaultResult<()> {
        let collection = T::COLLECTION;
        let data = bincode::serialize(record)?;
        let values = record.index_values();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        check_unique(&tx, collection, record.id(), &values)?;

        tx.execute(
            "INSERT OR REPLACE INTO records (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection.name(), record.id(), data],
        )?;
        tx.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND record_id = ?2",
            params![collection.name(), record.id()],
        )?;
        write_index(&tx, collection, record.id(), &values)?;

        tx.commit()?;
        Ok(())
    }

    /// Get a record by id
    pub fn get<T: Record>(&self, id: &str) -> VaultResult<Option<T>> {
        let conn = self.conn.lock();

        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![T::COLLECTION.name(), id],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|bytes| decode(&bytes)).transpose()
    }

    /// Get a record by id or fail with `NotFound`
    pub fn require<T: Record>(&self, id: &str) -> VaultResult<T> {
        self.get(id)?.ok_or_else(|| VaultError::NotFound {
            collection: T::COLLECTION.name(),
            id: id.to_string(),
        })
    }

    /// All records of a collection, in no particular order
    pub fn get_all<T: Record>(&self) -> VaultResult<Vec<T>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT data FROM records WHERE collection = ?1")?;
        let rows = stmt.query_map(params![T::COLLECTION.name()], |row| row.get::<_, Vec<u8>>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(&row?)?);
        }
        Ok(records)
    }

    /// Records whose `index` equals `value`
    pub fn get_by_index<T: Record>(&self, index: &str, value: &str) -> VaultResult<Vec<T>> {
        let collection = T::COLLECTION;
        collection.index(index)?;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.data FROM records r
             INNER JOIN record_index i
                ON r.collection = i.collection AND r.id = i.record_id
             WHERE i.collection = ?1 AND i.index_name = ?2 AND i.value = ?3",
        )?;
        let rows = stmt.query_map(params![collection.name(), index, value], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(&row?)?);
        }
        Ok(records)
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete<T: Record>(&self, id: &str) -> VaultResult<bool> {
        let collection = T::COLLECTION;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM record_index WHERE collection = ?1 AND record_id = ?2",
            params![collection.name(), id],
        )?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.name(), id],
        )?;

        tx.commit()?;
        Ok(removed > 0)
    }

    /// Count records in a collection
    pub fn count<T: Record>(&self) -> VaultResult<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![T::COLLECTION.name()],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// The active AI config. Returns the first match if several are active.
    pub fn get_active_ai_config(&self) -> VaultResult<Option<AiConfig>> {
        Ok(self
            .get_by_index::<AiConfig>("isActive", "true")?
            .into_iter()
            .next())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETTINGS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn get_setting(&self, key: &str) -> VaultResult<Option<String>> {
        let conn = self.conn.lock();

        Ok(conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Write several settings at once. Fails without writing anything if
    /// any of the keys already exists.
    pub fn insert_settings(&self, entries: &[(&str, String)]) -> VaultResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for (key, value) in entries {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            if exists {
                return Err(VaultError::DuplicateKey {
                    collection: "settings",
                    key: key.to_string(),
                });
            }
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> VaultResult<T> {
    bincode::deserialize(bytes).map_err(|e| VaultError::DeserializationError(e.to_string()))
}

fn check_unique(
    tx: &Transaction<'_>,
    collection: Collection,
    id: &str,
    values: &[(&'static str, String)],
) -> VaultResult<()> {
    for (name, value) in values {
        if !collection.index(name)?.unique {
            continue;
        }

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM record_index
                 WHERE collection = ?1 AND index_name = ?2 AND value = ?3 AND record_id != ?4)",
            params![collection.name(), name, value, id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(VaultError::DuplicateKey {
                collection: collection.name(),
                key: format!("{}={}", name, value),
            });
        }
    }
    Ok(())
}

fn write_index(
    tx: &Transaction<'_>,
    collection: Collection,
    id: &str,
    values: &[(&'static str, String)],
) -> VaultResult<()> {
    for (name, value) in values {
        tx.execute(
            "INSERT INTO record_index (collection, index_name, value, record_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection.name(), name, value, id],
        )?;
    }
    Ok(())
}
