use crate::{
    embedding::Embedder,
    error::Result,
    note_store::{NoteKey, NoteStore},
    reflow::reflow,
    retrieval::{Match, RetrievalIndex},
};

/// Notes shorter than this many characters are not stored.
pub const MIN_NOTE_CHARS: usize = 2;

/// Outcome of a recall request.
#[derive(Debug, Clone, PartialEq)]
pub enum Recall {
    /// The store holds no notes, so nothing was searched.
    NoNotes,
    Found(Match),
}

#[derive(Debug, Clone, Copy)]
pub struct RecallOptions {
    /// Reflow the matched text before returning it.
    pub reflow: bool,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self { reflow: true }
    }
}

/// Store `text` as a new note.
///
/// Returns `None` without touching the store when the text has fewer than
/// [`MIN_NOTE_CHARS`] characters.
pub fn add_note(store: &NoteStore, text: &str) -> Result<Option<NoteKey>> {
    if text.chars().count() < MIN_NOTE_CHARS {
        tracing::debug!("skipping note shorter than {MIN_NOTE_CHARS} characters");
        return Ok(None);
    }
    store.append(text).map(Some)
}

/// Find the stored note closest to `query`.
///
/// The store is checked for notes first; an empty store yields
/// [`Recall::NoNotes`] and the embedder is never called. Otherwise the
/// retrieval index is rebuilt from every stored note.
pub fn recall(
    store: &NoteStore,
    embedder: &mut dyn Embedder,
    query: &str,
    options: RecallOptions,
) -> Result<Recall> {
    recall_with_progress(store, embedder, query, options, |_, _| {})
}

/// Like [`recall`], reporting `(embedded, total)` while the index is built.
pub fn recall_with_progress(
    store: &NoteStore,
    embedder: &mut dyn Embedder,
    query: &str,
    options: RecallOptions,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Recall> {
    let Some(notes) = store.load_all()? else {
        return Ok(Recall::NoNotes);
    };

    let total = notes.len();
    let index = RetrievalIndex::build_with_progress(&notes, embedder, |done| {
        on_progress(done, total)
    })?;
    let mut hit = index.query(query, embedder)?;
    tracing::debug!(key = hit.key, distance = hit.distance, "recalled note");

    if options.reflow {
        hit.text = reflow(&hit.text);
    }
    Ok(Recall::Found(hit))
}
