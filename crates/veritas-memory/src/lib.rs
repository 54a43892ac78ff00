pub mod embeddings;
pub mod store;

pub use embeddings::{create_embedder, EmbeddingProvider, HashingEmbedder, HttpEmbeddingProvider};
pub use store::{source_id, SqliteVectorStore};
