//! Shared error taxonomy.
//!
//! All of these are structural or logical errors, not transient ones: they
//! are raised at the point of detection and unwound to the nearest
//! caller-controlled boundary without retry or silent recovery. Partial
//! output from an aborted import must be discarded by the caller.
use obinstr::types::DynType;
use thiserror::Error;

use crate::{class::ObjectKey, graph::SourceValue};

#[derive(Debug, Error)]
pub enum ObError {
    /// An operand was never defined in the current or an enclosing scope.
    /// Indicates a structural inconsistency in the source graph; the
    /// enclosing method import is aborted.
    #[error("unresolved operand: source value {value} was never defined in the current or an enclosing scope")]
    UnresolvedOperand { value: SourceValue },

    /// Operand-count mismatch entering a loop region or unpacking a tuple.
    #[error("arity mismatch in {context}: expected {expected} operand(s), found {actual}")]
    ArityMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A block ended with a terminator that is not valid in its position
    /// (e.g. a loop-continue outside a loop body).
    #[error("malformed terminator in {context}")]
    MalformedTerminator { context: String },

    /// A value's established type neither matches nor widens to the type a
    /// use site requires.
    #[error("type conflict in {context}: have {have}, want {want}")]
    TypeConflict {
        context: String,
        have: DynType,
        want: DynType,
    },

    /// An attribute access or method call on a value that is not an object.
    #[error("{context}: value of type {have} is not an object")]
    NotAnObject { context: String, have: DynType },

    /// Instantiation-time disagreement between a class description and the
    /// supplied slot values.
    #[error("slot mismatch instantiating class '{class}': {detail}")]
    SlotMismatch { class: String, detail: String },

    /// An annotation path does not resolve. Rejected without corrupting the
    /// overlay state.
    #[error("invalid export path: {detail}")]
    InvalidPath { detail: String },

    /// A class description was structurally mutated after annotation. This
    /// signals misuse by the caller; the overlay does not resynchronize
    /// because a general mapping from old to new member identity is not
    /// recoverable.
    #[error(
        "annotations out of sync for class '{class}': {member} count is {annotated}, class now has {live}"
    )]
    AnnotationOutOfSync {
        class: String,
        member: &'static str,
        annotated: usize,
        live: usize,
    },

    /// A class key did not resolve in the class arena.
    #[error("unknown class key {class:?}")]
    UnknownClass { class: obinstr::types::ClassKey },

    /// An object key did not resolve in the object arena.
    #[error("unknown object key {object:?}")]
    UnknownObject { object: ObjectKey },

    /// A class has no attribute or method with the given name.
    #[error("class '{class}' has no member named '{member}'")]
    UnknownMember { class: String, member: String },
}

pub type ObResult<T> = Result<T, ObError>;
