//! Block terminators.
//!
//! Every block ends in exactly one terminator. `ret` closes a function body,
//! `yield` closes a loop-body region carrying the updated continue condition
//! and loop-carried values, and `slot_done` closes a construction region.
use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::operand::{Name, Operand};

/// Return from a function body. Zero or more return values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ret {
    pub values: Vec<Operand>,
}

/// Exit of a loop-body region.
///
/// `cond` is the updated continue condition (a `bool`); `values` are the
/// updated loop-carried values, matching the loop header's carried types
/// exactly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Yield {
    pub cond: Operand,
    pub values: Vec<Operand>,
}

/// Exit of a construction region. Carries nothing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotDone;

/// Block terminator.
#[derive(Debug, Clone, PartialEq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObTerminator {
    Ret(Ret),
    Yield(Yield),
    SlotDone(SlotDone),
}

impl ObTerminator {
    #[auto_enum(Iterator)]
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        match self {
            ObTerminator::Ret(ret) => ret.values.iter(),
            ObTerminator::Yield(y) => std::iter::once(&y.cond).chain(y.values.iter()),
            ObTerminator::SlotDone(_) => std::iter::empty(),
        }
    }

    #[auto_enum(Iterator)]
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        match self {
            ObTerminator::Ret(ret) => ret.values.iter_mut(),
            ObTerminator::Yield(y) => std::iter::once(&mut y.cond).chain(y.values.iter_mut()),
            ObTerminator::SlotDone(_) => std::iter::empty(),
        }
    }

    pub fn dependencies(&self) -> impl Iterator<Item = Name> {
        self.operands().filter_map(|op| {
            if let Operand::Reg(name) = op {
                Some(*name)
            } else {
                None
            }
        })
    }
}

impl Default for ObTerminator {
    fn default() -> Self {
        ObTerminator::Ret(Ret { values: Vec::new() })
    }
}

macro_rules! define_terminator_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for ObTerminator {
            fn from(inst: $typ) -> Self {
                ObTerminator::$variant(inst)
            }
        }
    };
}

define_terminator_from!(Ret, Ret);
define_terminator_from!(Yield, Yield);
define_terminator_from!(SlotDone, SlotDone);
