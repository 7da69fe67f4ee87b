pub mod chain;
pub mod chat;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod session;

// Re-export key types
pub use chain::{build_chains, load_chains, Pipeline, PipelineError, SummaryBufferMemory};
pub use chat::{chat, History, StepOutcome, Turn, TurnOutcome, UNAVAILABLE_NOTICE};
pub use model::{ModelError, RigModel, TextModel};
pub use prompt::{PromptError, PromptSet, PromptTemplate};
pub use session::TutorSession;
