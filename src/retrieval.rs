use rayon::prelude::*;

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    note_store::{NoteKey, Notes},
};

/// The stored note closest to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub key: NoteKey,
    pub text: String,
    /// Squared L2 distance between the query and note embeddings. Lower is
    /// closer; an identical embedding scores 0.
    pub distance: f32,
}

#[derive(Debug, Clone)]
struct IndexedNote {
    key: NoteKey,
    text: String,
    vector: Vec<f32>,
}

/// Exact nearest-neighbour index over note embeddings.
///
/// Built from a full snapshot of the note store and never updated in place;
/// callers rebuild it whenever they need fresh results.
#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    entries: Vec<IndexedNote>,
    dimension: usize,
}

impl RetrievalIndex {
    /// Embed every note and index the vectors.
    ///
    /// Fails with [`Error::EmptyIndex`] when `notes` is empty.
    pub fn build(notes: &Notes, embedder: &mut dyn Embedder) -> Result<Self> {
        Self::build_with_progress(notes, embedder, |_| {})
    }

    /// Like [`RetrievalIndex::build`], calling `on_embedded` with the running
    /// count after each note is embedded.
    pub fn build_with_progress(
        notes: &Notes,
        embedder: &mut dyn Embedder,
        mut on_embedded: impl FnMut(usize),
    ) -> Result<Self> {
        if notes.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut entries = Vec::with_capacity(notes.len());
        let mut dimension = None;

        for (key, text) in notes {
            let vector = embedder.embed(text)?;
            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }

            entries.push(IndexedNote {
                key: *key,
                text: text.clone(),
                vector,
            });
            on_embedded(entries.len());
        }

        let dimension = dimension.unwrap_or_default();
        tracing::debug!(notes = entries.len(), dimension, "built retrieval index");

        Ok(Self { entries, dimension })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Return up to `k` `(position, distance)` pairs nearest to `query`,
    /// closest first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .par_iter()
            .enumerate()
            .map(|(pos, entry)| (pos, squared_l2(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Embed `text` and return the single nearest note.
    pub fn query(&self, text: &str, embedder: &mut dyn Embedder) -> Result<Match> {
        let vector = embedder.embed(text)?;
        let (pos, distance) = self
            .search(&vector, 1)?
            .into_iter()
            .next()
            .ok_or(Error::EmptyIndex)?;

        let entry = &self.entries[pos];
        Ok(Match {
            key: entry.key,
            text: entry.text.clone(),
            distance,
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::TableEmbedder;

    fn notes(texts: &[&str]) -> Notes {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| (i as NoteKey, t.to_string()))
            .collect()
    }

    fn axes_embedder() -> TableEmbedder {
        TableEmbedder::new(vec![0.0, 0.0, 0.0])
            .with("alpha", vec![1.0, 0.0, 0.0])
            .with("beta", vec![0.0, 1.0, 0.0])
            .with("gamma", vec![0.0, 0.0, 1.0])
    }

    #[test]
    fn build_fails_without_notes() {
        let mut embedder = axes_embedder();
        let err = RetrievalIndex::build(&Notes::new(), &mut embedder)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyIndex));
        assert_eq!(embedder.calls, 0);
    }

    #[test]
    fn exact_duplicate_is_nearest() {
        let mut embedder = axes_embedder();
        let index =
            RetrievalIndex::build(&notes(&["alpha", "beta", "gamma"]), &mut embedder)
                .unwrap();

        let m = index.query("beta", &mut embedder).unwrap();
        assert_eq!(m.key, 1);
        assert_eq!(m.text, "beta");
        assert!(m.distance.abs() < 1e-6);
    }

    #[test]
    fn single_note_always_wins() {
        let mut embedder = axes_embedder();
        let index =
            RetrievalIndex::build(&notes(&["alpha"]), &mut embedder).unwrap();

        for query in ["alpha", "gamma", "something unrelated"] {
            let m = index.query(query, &mut embedder).unwrap();
            assert_eq!(m.key, 0);
            assert_eq!(m.text, "alpha");
        }
    }

    #[test]
    fn ties_resolve_to_earliest_note() {
        let mut embedder = TableEmbedder::new(vec![1.0, 1.0]);
        let index =
            RetrievalIndex::build(&notes(&["x", "y", "z"]), &mut embedder)
                .unwrap();

        let m = index.query("anything", &mut embedder).unwrap();
        assert_eq!(m.key, 0);
    }

    #[test]
    fn search_orders_by_distance() {
        let mut embedder = TableEmbedder::new(vec![0.0, 0.0])
            .with("far", vec![10.0, 0.0])
            .with("near", vec![1.0, 0.0])
            .with("mid", vec![3.0, 0.0]);
        let index =
            RetrievalIndex::build(&notes(&["far", "near", "mid"]), &mut embedder)
                .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|(pos, _)| *pos).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!((hits[1].1 - 9.0).abs() < 1e-6);

        assert_eq!(index.search(&[0.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let mut embedder = TableEmbedder::new(vec![0.0, 0.0])
            .with("long", vec![1.0, 2.0, 3.0]);
        let err = RetrievalIndex::build(&notes(&["short", "long"]), &mut embedder)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let mut embedder = axes_embedder();
        let index =
            RetrievalIndex::build(&notes(&["alpha"]), &mut embedder).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn progress_reports_each_note() {
        let mut embedder = axes_embedder();
        let mut seen = Vec::new();
        let index = RetrievalIndex::build_with_progress(
            &notes(&["alpha", "beta", "gamma"]),
            &mut embedder,
            |n| seen.push(n),
        )
        .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 3);
        assert_eq!(embedder.calls, 3);
    }
}
