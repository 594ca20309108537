pub mod chatbot;
pub mod knowledge;
pub mod loader;
pub mod maintenance;
pub mod splitter;
pub mod store;

pub use crate::domain::model::{ChatMessage, Chunk, ScoredChunk, SourceDocument, StoreStats};
pub use crate::domain::ports::{ChatModel, Embedder, Storage};
pub use crate::utils::error::Result;
