//! Conversational engine for bits.
//!
//! Dispatches each user message to plain chat, tool-augmented chat, or
//! retrieval-augmented chat, and keeps a bounded conversation memory that
//! folds old rounds into a running summary.

pub mod classifier;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod prompts;
pub mod retrieval;
pub mod session;
pub mod tooling;

pub use classifier::{ClassifierDebug, MetadataClassifier};
pub use error::ChatError;
pub use memory::{ConversationMemory, MemoryManager, MemorySnapshot};
pub use orchestrator::{ChatSettings, ModelSet, ResponseOrchestrator};
pub use retrieval::{HybridRetriever, RetrievalEntry, RetrievalResult};
pub use session::{ChatOutcome, SessionHandle};
pub use tooling::{ToolDecision, ToolPipeline};
