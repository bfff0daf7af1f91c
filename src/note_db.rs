use std::path::{Path, PathBuf};

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};

use crate::{
    error::Result,
    note_store::{NoteBackend, NoteKey, Notes},
};

const NOTES: TableDefinition<u64, &str> = TableDefinition::new("notes");

/// Notes stored in a redb database.
///
/// The next key is read and the note inserted inside one write transaction.
/// redb admits a single writer at a time, so appends from concurrent
/// sessions are serialised instead of overwriting each other.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// Open or create a notes database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use notebert::note_db::RedbBackend;
    /// use notebert::note_store::NoteBackend;
    ///
    /// let db = RedbBackend::open(&tmp.path().join("notes.redb")).unwrap();
    /// assert!(db.load_all().unwrap().is_none());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(NOTES)?;
        txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Append several notes in a single transaction, returning their keys.
    pub fn batch_append(&self, texts: &[String]) -> Result<Vec<NoteKey>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let txn = self.db.begin_write()?;
        let keys = {
            let mut table = txn.open_table(NOTES)?;
            let mut next = table.len()?;
            let mut keys = Vec::with_capacity(texts.len());
            for text in texts {
                table.insert(next, text.as_str())?;
                keys.push(next);
                next += 1;
            }
            keys
        };
        txn.commit()?;
        Ok(keys)
    }
}

impl NoteBackend for RedbBackend {
    fn append(&self, text: &str) -> Result<NoteKey> {
        let txn = self.db.begin_write()?;
        let key = {
            let mut table = txn.open_table(NOTES)?;
            let key = table.len()?;
            table.insert(key, text)?;
            key
        };
        txn.commit()?;
        Ok(key)
    }

    fn append_many(&self, texts: &[String]) -> Result<Vec<NoteKey>> {
        self.batch_append(texts)
    }

    fn load_all(&self) -> Result<Option<Notes>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        let mut notes = Notes::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            notes.insert(k.value(), v.value().to_string());
        }
        Ok((!notes.is_empty()).then_some(notes))
    }

    fn get(&self, key: NoteKey) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn len(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        Ok(table.len()? as usize)
    }

    fn describe(&self) -> String {
        format!("redb:{}", self.path.display())
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
