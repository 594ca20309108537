// Adapters layer: concrete implementations of the domain ports (model runtime, storage).

pub mod ollama;
pub mod storage;
