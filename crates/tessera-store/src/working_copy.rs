//! SQLite working copy (`working.db`)
//!
//! Meta items and features are materialised as JSON rows per dataset; the
//! tree they were last synced to is kept in `wc_state`.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::working_copy_migrations;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::Value;
use std::path::Path;
use tessera_core::dataset::{find_datasets, DatasetState, PrimaryKey};
use tessera_core::diff::RepoDiff;
use tessera_core::errors::{ExError, ExErrorKind, ExResult};
use tessera_core::object::{ObjectId, ObjectStore};
use tessera_core::working_copy::WorkingCopy;

const BASE_TREE_KEY: &str = "base_tree";

pub struct SqliteWorkingCopy {
    conn: Connection,
}

impl SqliteWorkingCopy {
    /// Open (creating and migrating if needed) the working copy at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: db::open_migrated(path, working_copy_migrations())?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        db::configure(&conn)?;
        crate::migrations::apply_migrations(&mut conn, working_copy_migrations())?;
        Ok(Self { conn })
    }

    fn transaction(&self) -> Result<Transaction<'_>> {
        self.conn.unchecked_transaction().map_err(from_rusqlite)
    }
}

fn write_diff(tx: &Transaction<'_>, diff: &RepoDiff) -> Result<()> {
    for (dataset, ds_diff) in &diff.datasets {
        for (item, change) in &ds_diff.meta {
            let name = item.as_name();
            let written = match change.new_value() {
                Some(value) => tx.execute(
                    "INSERT INTO wc_meta (dataset, name, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(dataset, name) DO UPDATE SET value = ?3",
                    rusqlite::params![dataset, name, value],
                ),
                None => tx.execute(
                    "DELETE FROM wc_meta WHERE dataset = ?1 AND name = ?2",
                    rusqlite::params![dataset, name],
                ),
            };
            written.map_err(from_rusqlite)?;
        }
        for delta in &ds_diff.feature {
            let pk = delta.pk.encode();
            let written = match delta.change.new_value() {
                Some(feature) => tx.execute(
                    "INSERT INTO wc_features (dataset, pk, data) VALUES (?1, ?2, ?3)
                     ON CONFLICT(dataset, pk) DO UPDATE SET data = ?3",
                    rusqlite::params![dataset, pk, Value::Object(feature.clone())],
                ),
                None => tx.execute(
                    "DELETE FROM wc_features WHERE dataset = ?1 AND pk = ?2",
                    rusqlite::params![dataset, pk],
                ),
            };
            written.map_err(from_rusqlite)?;
        }
    }
    Ok(())
}

fn set_base(tx: &Transaction<'_>, tree: &ObjectId) -> Result<()> {
    tx.execute(
        "INSERT INTO wc_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = ?2",
        rusqlite::params![BASE_TREE_KEY, tree.as_str()],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

impl WorkingCopy for SqliteWorkingCopy {
    fn base_tree(&self) -> ExResult<Option<ObjectId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM wc_state WHERE key = ?",
                [BASE_TREE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        Ok(value.map(|v| ObjectId::parse(&v)).transpose()?)
    }

    fn reset(&self, store: &dyn ObjectStore, tree: &ObjectId) -> ExResult<()> {
        let datasets = find_datasets(store, tree)?;
        let tx = self.transaction()?;
        tx.execute_batch("DELETE FROM wc_meta; DELETE FROM wc_features;")
            .map_err(from_rusqlite)?;

        for (name, dataset) in &datasets {
            let state = dataset.state(store)?;
            for (item, value) in &state.meta {
                tx.execute(
                    "INSERT INTO wc_meta (dataset, name, value) VALUES (?1, ?2, ?3)",
                    rusqlite::params![name, item, value],
                )
                .map_err(from_rusqlite)?;
            }
            for (pk, feature) in state.features {
                tx.execute(
                    "INSERT INTO wc_features (dataset, pk, data) VALUES (?1, ?2, ?3)",
                    rusqlite::params![name, pk.encode(), Value::Object(feature)],
                )
                .map_err(from_rusqlite)?;
            }
        }
        set_base(&tx, tree)?;
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(tree = tree.short(), datasets = datasets.len(), "reset working copy");
        Ok(())
    }

    fn apply_changes(&self, diff: &RepoDiff) -> ExResult<()> {
        let tx = self.transaction()?;
        write_diff(&tx, diff)?;
        tx.commit().map_err(from_rusqlite)?;
        Ok(())
    }

    fn sync_to(&self, tree: &ObjectId, diff: &RepoDiff) -> ExResult<()> {
        let tx = self.transaction()?;
        write_diff(&tx, diff)?;
        set_base(&tx, tree)?;
        tx.commit().map_err(from_rusqlite)?;
        tracing::debug!(tree = tree.short(), changes = diff.change_count(), "synced working copy");
        Ok(())
    }

    fn dataset_names(&self) -> ExResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT dataset FROM wc_meta UNION SELECT dataset FROM wc_features ORDER BY 1",
            )
            .map_err(from_rusqlite)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(from_rusqlite)?;
        Ok(names)
    }

    fn read_state(&self, dataset: &str) -> ExResult<Option<DatasetState>> {
        let mut state = DatasetState::default();

        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM wc_meta WHERE dataset = ?")
            .map_err(from_rusqlite)?;
        let meta = stmt
            .query_map([dataset], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        state.meta.extend(meta);

        let mut stmt = self
            .conn
            .prepare("SELECT pk, data FROM wc_features WHERE dataset = ?")
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([dataset], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        for (pk, data) in rows {
            let Value::Object(feature) = data else {
                return Err(ExError::new(ExErrorKind::CorruptObject)
                    .with_dataset(dataset)
                    .with_item(&pk)
                    .with_message("working copy feature is not a JSON object"));
            };
            state.features.insert(PrimaryKey::decode(&pk)?, feature);
        }

        if state.meta.is_empty() && state.features.is_empty() {
            return Ok(None);
        }
        Ok(Some(state))
    }
}
