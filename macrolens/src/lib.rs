// Library interface for macrolens modules
// This allows tests and other binaries to import modules

pub mod agents;
pub mod analysis;
pub mod error;
pub mod export;
pub mod llm;
pub mod orchestrator;
pub mod runs;
pub mod server;
