pub mod builder;
pub mod memory;
pub mod pipeline;

pub use builder::{build_chains, load_chains};
pub use memory::{estimate_tokens, MemorySettings, SummaryBufferMemory};
pub use pipeline::{Pipeline, PipelineError};
