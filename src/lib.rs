pub mod chunking;
pub mod completion;
pub mod compose;
pub mod config;
pub mod conversation;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gate;
pub mod gemini;
pub mod rag;
pub mod retrieval;
pub mod store;

pub use error::{RagError, Result};
