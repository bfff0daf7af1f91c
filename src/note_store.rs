//! Append-only note storage.
//!
//! Each note is keyed one past the highest key already stored, so a store
//! written only through this module holds keys `0..N`. There is no update or
//! delete path. The storage medium is a [`NoteBackend`]; [`NoteStore`] is the handle
//! the rest of the crate works with.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::Serialize;

use crate::{
    data_dir::DataDir,
    error::{Error, Result},
    note_db::RedbBackend,
};

/// Key assigned to a note at insertion time.
pub type NoteKey = u64;

/// Full store contents, ordered by key.
pub type Notes = BTreeMap<NoteKey, String>;

/// A storage medium for notes.
///
/// `load_all` returns `None` when there is nothing to read: the record is
/// absent, unreadable, or holds no notes. Callers treat that as "no notes"
/// rather than as a failure.
pub trait NoteBackend: Send + Sync {
    /// Append `text` under the next free key and return that key.
    fn append(&self, text: &str) -> Result<NoteKey>;

    fn load_all(&self) -> Result<Option<Notes>>;

    /// Append several notes in order, returning their keys.
    fn append_many(&self, texts: &[String]) -> Result<Vec<NoteKey>> {
        texts.iter().map(|text| self.append(text)).collect()
    }

    /// Human readable location, used in status output and logs.
    fn describe(&self) -> String;

    fn get(&self, key: NoteKey) -> Result<Option<String>> {
        Ok(self.load_all()?.and_then(|mut notes| notes.remove(&key)))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.load_all()?.map_or(0, |notes| notes.len()))
    }
}

/// Which backend a [`NoteStore`] is opened with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum,
)]
pub enum StoreKind {
    /// Transactional redb database (`notes.redb`).
    #[default]
    Redb,
    /// Flat JSON record rewritten on every insert (`notes.json`).
    Json,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Redb => "redb",
            StoreKind::Json => "json",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(StoreKind::Redb),
            "json" => Ok(StoreKind::Json),
            other => Err(Error::Config(format!(
                "unknown store backend '{other}' (expected 'redb' or 'json')"
            ))),
        }
    }
}

/// Handle over a note backend.
pub struct NoteStore {
    backend: Box<dyn NoteBackend>,
}

impl NoteStore {
    pub fn new(backend: impl NoteBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Open the store of the given kind inside the data directory.
    pub fn open(kind: StoreKind, data_dir: &DataDir) -> Result<Self> {
        let store = match kind {
            StoreKind::Redb => Self::new(RedbBackend::open(&data_dir.notes_db())?),
            StoreKind::Json => {
                Self::new(JsonFileBackend::new(data_dir.notes_json()))
            }
        };
        tracing::debug!(backend = %store.describe(), "opened note store");
        Ok(store)
    }

    /// A store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    pub fn append(&self, text: &str) -> Result<NoteKey> {
        let key = self.backend.append(text)?;
        tracing::debug!(key, bytes = text.len(), "appended note");
        Ok(key)
    }

    pub fn append_many(&self, texts: &[String]) -> Result<Vec<NoteKey>> {
        let keys = self.backend.append_many(texts)?;
        tracing::debug!(count = keys.len(), "appended notes");
        Ok(keys)
    }

    /// Append every note of a record in key order. Keys are reassigned by
    /// this store.
    pub fn import(&self, record: &Notes) -> Result<Vec<NoteKey>> {
        let texts: Vec<String> = record.values().cloned().collect();
        self.append_many(&texts)
    }

    pub fn load_all(&self) -> Result<Option<Notes>> {
        self.backend.load_all()
    }

    pub fn get(&self, key: NoteKey) -> Result<Option<String>> {
        self.backend.get(key)
    }

    pub fn len(&self) -> Result<usize> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}

impl fmt::Debug for NoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteStore")
            .field("backend", &self.describe())
            .finish()
    }
}

// -- JSON record --

/// Notes kept in a single JSON object mapping decimal keys to text.
///
/// ```json
/// {
///     "0": "first note",
///     "1": "second note"
/// }
/// ```
///
/// Every append reads the whole file and rewrites it. Two processes
/// appending at the same time race, and the later rewrite wins.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

/// First key after the highest stored key. A hand-edited record may have
/// gaps, so the count of notes is not a safe next key.
fn next_key(notes: &Notes) -> NoteKey {
    notes.last_key_value().map_or(0, |(key, _)| key + 1)
}

impl NoteBackend for JsonFileBackend {
    fn append(&self, text: &str) -> Result<NoteKey> {
        let mut notes = read_record(&self.path).unwrap_or_default();
        let key = next_key(&notes);
        notes.insert(key, text.to_string());
        write_record(&self.path, &notes)?;
        Ok(key)
    }

    fn append_many(&self, texts: &[String]) -> Result<Vec<NoteKey>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut notes = read_record(&self.path).unwrap_or_default();
        let start = next_key(&notes);
        let keys: Vec<NoteKey> = (start..start + texts.len() as NoteKey).collect();
        for (key, text) in keys.iter().zip(texts) {
            notes.insert(*key, text.clone());
        }
        write_record(&self.path, &notes)?;
        Ok(keys)
    }

    fn load_all(&self) -> Result<Option<Notes>> {
        Ok(read_record(&self.path).filter(|notes| !notes.is_empty()))
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Parse a JSON note record, failing on anything that is not an object of
/// decimal keys to strings.
pub fn parse_record(raw: &str) -> Result<Notes> {
    Ok(serde_json::from_str(raw)?)
}

/// Read a JSON note record, treating a missing or malformed file as absent.
pub fn read_record(path: &Path) -> Option<Notes> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "note record not readable");
            return None;
        }
    };

    match parse_record(&raw) {
        Ok(notes) => Some(notes),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "note record not parseable");
            None
        }
    }
}

/// Encode notes in the record format, indented by four spaces.
pub fn encode_record(notes: &Notes) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, formatter);
    notes.serialize(&mut serializer)?;
    Ok(buf)
}

/// Write the full mapping as an indented JSON record.
///
/// The file is written beside the target and renamed over it, so readers
/// never observe a half-written record.
pub fn write_record(path: &Path, notes: &Notes) -> Result<()> {
    replace_file(path, &encode_record(notes)?)
}

/// Write `contents` to `<path>.tmp` and rename it over `path`, creating the
/// parent directory if needed.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// -- In memory --

#[derive(Debug, Default)]
pub struct MemoryBackend {
    notes: Mutex<Notes>,
}

impl MemoryBackend {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Notes>> {
        self.notes
            .lock()
            .map_err(|_| Error::Config("note store lock poisoned".into()))
    }
}

impl NoteBackend for MemoryBackend {
    fn append(&self, text: &str) -> Result<NoteKey> {
        let mut notes = self.lock()?;
        let key = next_key(&notes);
        notes.insert(key, text.to_string());
        Ok(key)
    }

    fn load_all(&self) -> Result<Option<Notes>> {
        let notes = self.lock()?;
        Ok((!notes.is_empty()).then(|| notes.clone()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
