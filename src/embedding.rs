use candle_core::Tensor;

use crate::error::{Error, Result};

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, and every vector from one embedder has the same length.
/// Notes and queries go through the same function.
pub trait Embedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Collapse a `[tokens, dimension]` token embedding matrix into a single
/// unit-length vector by averaging over tokens.
pub fn mean_pool(token_embeddings: &Tensor) -> Result<Vec<f32>> {
    let (tokens, _dimension) =
        token_embeddings.dims2().map_err(map_candle_err)?;
    if tokens == 0 {
        return Err(Error::Model("model produced no token embeddings".into()));
    }

    let pooled = token_embeddings
        .mean(0)
        .map_err(map_candle_err)?
        .to_vec1::<f32>()
        .map_err(map_candle_err)?;

    Ok(normalize(pooled))
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

fn map_candle_err(e: candle_core::Error) -> Error {
    Error::Model(format!("tensor computation error: {e}"))
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    fn make_tensor(data: &[f32], shape: (usize, usize)) -> Tensor {
        Tensor::from_vec(data.to_vec(), shape, &Device::Cpu).unwrap()
    }

    #[test]
    fn mean_pool_averages_tokens() {
        // Two tokens [1, 0] and [0, 1] average to [0.5, 0.5], which
        // normalises to [1/sqrt(2), 1/sqrt(2)].
        let t = make_tensor(&[1.0, 0.0, 0.0, 1.0], (2, 2));
        let pooled = mean_pool(&t).unwrap();
        let expected = 1.0 / 2f32.sqrt();
        assert_eq!(pooled.len(), 2);
        assert!((pooled[0] - expected).abs() < 1e-6);
        assert!((pooled[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn mean_pool_single_token_is_normalised() {
        let t = make_tensor(&[3.0, 4.0], (1, 2));
        let pooled = mean_pool(&t).unwrap();
        assert!((pooled[0] - 0.6).abs() < 1e-6);
        assert!((pooled[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn mean_pool_rejects_non_matrix() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0], 2, &Device::Cpu).unwrap();
        assert!(mean_pool(&t).is_err());
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}

/// Deterministic embedders for tests that must not load a model.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::Embedder;
    use crate::error::Result;

    /// Looks texts up in a fixed table; unknown texts map to `fallback`.
    #[derive(Debug, Clone)]
    pub struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
        pub calls: usize,
    }

    impl TableEmbedder {
        pub fn new(fallback: Vec<f32>) -> Self {
            Self {
                table: HashMap::new(),
                fallback,
                calls: 0,
            }
        }

        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.table.insert(text.to_string(), vector);
            self
        }
    }

    impl Embedder for TableEmbedder {
        fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
            self.calls += 1;
            Ok(self
                .table
                .get(text)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }
}
