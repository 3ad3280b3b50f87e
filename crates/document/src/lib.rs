//! # Document
//!
//! Structural document building and pruning over MessagePack.
//!
//! Responsibilities:
//! - Incremental serialization with deferred container size finalization
//! - Compiling field path patterns and pruning matched keys out of a
//!   document without touching anything else

pub mod builder;
pub mod pattern;
pub mod pruner;

pub use builder::{
    patch_array_header, patch_map_header, record_count, ContainerHeader, ContainerKind,
    DocumentBuilder,
};
pub use pattern::{CompileError, MatchState, PathPattern, PatternSet};
pub use pruner::Evaluation;
