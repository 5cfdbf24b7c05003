//! Generative backend abstraction and the Gemini implementation.

mod backend;
mod error;
mod gemini;

pub use backend::{FileState, GenerativeBackend, RemoteFile};
pub use error::LlmError;
pub use gemini::GeminiClient;
