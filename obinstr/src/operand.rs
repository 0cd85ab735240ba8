//! Shared operand types for instructions.
//!
//! An instruction operand is either a reference to a previously defined SSA
//! value (`Reg`) or an immediate constant (`Imm`).
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

/// SSA value identifier, naming the destination of an instruction or
/// referencing another instruction's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Name(pub u32);

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label of a block within a region.
///
/// Labels never cross region boundaries: a label is only meaningful within
/// the region whose block list it indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Label(pub u32);

impl Label {
    /// The region entry label. Always present.
    pub const NIL: Label = Label(0);

    pub fn is_nil(&self) -> bool {
        self == &Label::NIL
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "label ^{}", self.0)
        } else {
            write!(f, "^{}", self.0)
        }
    }
}

/// Immediate constant.
#[derive(Clone, Debug, PartialEq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Const {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::Bool(v) => write!(f, "{}", v),
            Const::Int(v) => write!(f, "{}", v),
            Const::Float(v) => write!(f, "{:?}", v),
            Const::Str(v) => write!(f, "{:?}", v),
            Const::None => write!(f, "none"),
        }
    }
}

/// Instruction operand.
#[derive(Clone, Debug, PartialEq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// Reference to a previously defined SSA value.
    Reg(Name),
    /// Immediate constant.
    Imm(Const),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(name) => write!(f, "%{}", name),
            Operand::Imm(constant) => write!(f, "{}", constant),
        }
    }
}

impl From<Name> for Operand {
    fn from(name: Name) -> Self {
        Operand::Reg(name)
    }
}

impl From<Const> for Operand {
    fn from(constant: Const) -> Self {
        Operand::Imm(constant)
    }
}
