//! Core processing modules

pub mod dem;
pub mod engine;
pub mod graph_generator;
pub mod pipeline;
pub mod stack;
pub mod substitutions;

// Re-export main types
pub use dem::DemSelector;
pub use engine::{Engine, EngineDriver, GptEngine};
pub use graph_generator::GraphGenerator;
pub use pipeline::SnapPolarimetry;
pub use stack::{BandTile, StackAssembler};
pub use substitutions::ParameterResolver;
