use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::storage::KeyValueStore;

const DB_NAME: &str = "lifelink";

/// Durable [`KeyValueStore`] backed by an LMDB environment.
///
/// Each write commits its own read-write transaction. There is no
/// cross-key atomicity: two writers touching the same key resolve as last
/// write wins.
pub struct AppDbState {
    env: Environment,
    db: Database,
    path: PathBuf,
    map_size: usize,
}

impl AppDbState {
    pub fn init(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let path = config.db_path();
        let (env, db) = open_environment(&path, config.map_size)?;
        info!("LMDB environment ready at {}", path.display());

        Ok(Self {
            env,
            db,
            path,
            map_size: config.map_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes every key while leaving the environment open.
    pub fn clear_all_records(&self) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;
        info!("Cleared all records in {}", self.path.display());
        Ok(())
    }

    /// Deletes the environment on disk and reopens an empty one under `name`,
    /// next to the current one.
    pub fn reset_database(&mut self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidConfig("name must not be empty".to_string()));
        }

        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let new_path = parent.join(format!("{name}.lmdb"));

        // LMDB must not open the same environment twice in one process.
        if new_path == self.path {
            return self.clear_all_records();
        }

        let (env, db) = open_environment(&new_path, self.map_size)?;
        let old_path = std::mem::replace(&mut self.path, new_path);
        // Dropping the old environment closes it before its files go away.
        self.env = env;
        self.db = db;

        if let Err(e) = fs::remove_dir_all(&old_path) {
            warn!("Could not remove old environment {}: {e}", old_path.display());
        }

        info!("Database reset to {}", self.path.display());
        Ok(())
    }

    /// Flushes buffered data to disk. The environment itself closes on drop.
    pub fn close_database(&self) -> Result<()> {
        self.env.sync(true)?;
        debug!("Synced {} before close", self.path.display());
        Ok(())
    }

    /// Writes raw bytes under `key` in its own committed transaction.
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }
}

fn open_environment(path: &Path, map_size: usize) -> Result<(Environment, Database)> {
    fs::create_dir_all(path)?;

    let env = Environment::new()
        .set_max_dbs(1)
        .set_map_size(map_size)
        .open(path)?;
    let db = env.create_db(Some(DB_NAME), DatabaseFlags::empty())?;

    Ok((env, db))
}

impl KeyValueStore for AppDbState {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Some(text.to_string()),
                Err(source) => {
                    return Err(StoreError::InvalidUtf8 {
                        key: key.to_string(),
                        source,
                    })
                }
            },
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.set_bytes(key, value.as_bytes())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        txn.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.clear_all_records()
    }
}
