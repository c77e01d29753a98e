pub mod config;
pub mod embedder;
pub mod error;
pub mod index;
pub mod matcher;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod uploads;

// Re-export vision types for convenience
pub use chartmatch_vision::{cosine_similarity, Embedding, Pipeline};
