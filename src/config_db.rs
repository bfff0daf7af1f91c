use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::{
    error::Result,
    model_manager::{DEFAULT_MODEL_ID, MODEL_ENV_VAR},
    note_store::StoreKind,
};

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Setting key holding the persisted model ID or local model path.
pub const MODEL_SETTING: &str = "model_name";

/// Setting key holding the persisted note store backend.
pub const STORE_SETTING: &str = "store_backend";

/// Persistent key/value settings for the CLI.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Resolve the model ID: `explicit` (from --model), then the stored
    /// setting, then `NOTEBERT_MODEL`, then the default model.
    pub fn resolve_model_id(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(model) = explicit {
            return Ok(model.to_string());
        }
        if let Some(model) = self.get_setting(MODEL_SETTING)? {
            return Ok(model);
        }
        Ok(std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()))
    }

    /// Resolve the note store backend: `explicit` (from --store), then the
    /// stored setting, then redb. A stored value that names no backend is a
    /// configuration error.
    pub fn resolve_store_kind(
        &self,
        explicit: Option<StoreKind>,
    ) -> Result<StoreKind> {
        if let Some(kind) = explicit {
            return Ok(kind);
        }
        match self.get_setting(STORE_SETTING)? {
            Some(raw) => raw.parse(),
            None => Ok(StoreKind::default()),
        }
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
