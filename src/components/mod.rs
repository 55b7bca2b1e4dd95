pub mod codec;
pub mod common;
pub mod metadata;
pub mod overlay;
pub mod postprocess;
pub mod registry;
pub mod rewriter;
pub mod scanner;
pub mod synthesizer;
