//! The source-side instruction graph model.
//!
//! This is the shape method bodies arrive in: blocks of instructions over
//! dynamically-typed values, with loops as nested blocks and subtype
//! substitutions already made explicit by the producing frontend. The
//! importer consumes this model at its interface boundary; it never mutates
//! it.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use obinstr::{operand::Const, types::DynType};
use strum::EnumIs;

/// Identity of a value inside a source graph. Only meaningful within one
/// method's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceValue(pub u32);

impl std::fmt::Display for SourceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One source instruction.
#[derive(Debug, Clone, PartialEq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceInstr {
    Constant {
        dest: SourceValue,
        value: Const,
        ty: DynType,
    },
    GetAttr {
        dest: SourceValue,
        object: SourceValue,
        name: String,
    },
    SetAttr {
        object: SourceValue,
        name: String,
        value: SourceValue,
    },
    CallMethod {
        dest: Option<SourceValue>,
        receiver: SourceValue,
        name: String,
        args: Vec<SourceValue>,
    },
    Print {
        args: Vec<SourceValue>,
    },
    Raise {
        exception: SourceValue,
    },
    /// Implicit widening made explicit by the producing frontend.
    Widen {
        dest: SourceValue,
        value: SourceValue,
        to: DynType,
    },
    /// Unchecked narrowing; the producer vouches for the narrower fact.
    Narrow {
        dest: SourceValue,
        value: SourceValue,
        to: DynType,
    },
    TupleUnpack {
        dests: Vec<SourceValue>,
        value: SourceValue,
        tys: Vec<DynType>,
    },
    BuildTuple {
        dest: SourceValue,
        elems: Vec<SourceValue>,
        tys: Vec<DynType>,
    },
    BuildList {
        dest: SourceValue,
        elems: Vec<SourceValue>,
        elem_ty: DynType,
    },
    NumToTensor {
        dest: SourceValue,
        value: SourceValue,
    },
    /// Unified loop: runs while the trip budget is not exhausted and the
    /// continue condition holds. The body block's parameters are the
    /// iteration index followed by one per carried value; its terminator
    /// must be [`SourceTerminator::LoopContinue`].
    Loop {
        dests: Vec<SourceValue>,
        max_trip_count: SourceValue,
        init_cond: SourceValue,
        init_values: Vec<SourceValue>,
        carried_tys: Vec<DynType>,
        body: SourceBlock,
    },
    GlobalGet {
        dest: SourceValue,
        name: String,
        ty: DynType,
    },
    GlobalSet {
        name: String,
        value: SourceValue,
    },
}

/// Exit of a source block.
#[derive(Debug, Clone, PartialEq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceTerminator {
    /// Return from the method.
    Return { values: Vec<SourceValue> },
    /// Loop-body exit: updated continue condition plus updated carried
    /// values. Only valid in a loop body.
    LoopContinue {
        cond: SourceValue,
        values: Vec<SourceValue>,
    },
}

/// A source block: typed parameters, instructions, terminator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceBlock {
    pub params: Vec<(SourceValue, DynType)>,
    pub instructions: Vec<SourceInstr>,
    pub terminator: SourceTerminator,
}

/// The body of one method. The entry block's parameters are the method
/// parameters, the receiver first.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceGraph {
    pub entry: SourceBlock,
    pub return_tys: Vec<DynType>,
}
