pub mod embedding;
pub mod model;
pub mod pipeline;
pub mod preprocess;

// Re-export commonly used types
pub use embedding::{cosine_similarity, Embedding};
pub use pipeline::Pipeline;
pub use preprocess::{Layout, PreprocessConfig};
