use ndarray::Array1;

/// Image embedding (pooled ResNet features)
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from_vec(values),
        }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// Euclidean norm, accumulated in f64 so large or tiny components
    /// neither overflow nor flush to zero.
    pub fn norm(&self) -> f64 {
        self.vector
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }
}

/// Compute cosine similarity between two embeddings.
///
/// Both embeddings are expected to have the same length; only the common
/// prefix is compared otherwise. A zero (or non-finite) norm on either side
/// yields 0.0 rather than NaN.
///
/// Products and sums are taken in f64 and only the final ratio is narrowed,
/// so exactly parallel vectors score exactly 1.0 whatever their magnitude.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    let norm_a = a.norm();
    let norm_b = b.norm();
    if !norm_a.is_finite() || !norm_b.is_finite() || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .vector
        .iter()
        .zip(b.vector.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();

    ((dot / (norm_a * norm_b)) as f32).clamp(-1.0, 1.0)
}
