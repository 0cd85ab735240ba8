//! Obsidian frontend core.
//!
//! Translates a hierarchical, dynamically-typed object program (class
//! instances whose method bodies are instruction graphs with loops and a
//! subtype discipline) into the static SSA form defined by `obinstr`, and
//! tracks which attributes and methods belong to the externally visible
//! surface of the compiled artifact.
//!
//! - `class`: class descriptions and object instance arenas
//! - `graph`: the source-side instruction graph model
//! - `scope`: the value/scope mapper used during import
//! - `importer`: the graph-to-SSA importer and terminator synthesis
//! - `instantiate`: bottom-up object-graph instantiation
//! - `annotate`: the per-class export annotation overlay
//! - `globals`: the process-wide named slot registry
//! - `error`: the shared error taxonomy
//!
//! Translation is single-threaded and synchronous: every operation runs to
//! completion or fails before returning. An importer instance owns its scope
//! stack exclusively; a caller driving imports concurrently must use one
//! importer per method. The annotation overlay is one shared structure per
//! translation unit and is not internally synchronized.

pub mod annotate;
pub mod class;
pub mod error;
pub mod globals;
pub mod graph;
pub mod importer;
pub mod instantiate;
pub mod scope;

pub use error::{ObError, ObResult};
