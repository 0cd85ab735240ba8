//! Blocks, regions, functions and modules.
//!
//! The static form is structured: control flow nests through regions
//! attached to instructions (loop bodies, construction slot lists) rather
//! than through arbitrary branch targets. A function body is a single entry
//! block whose nested regions carry the interesting structure.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::{
    instr::{Instruction, ObInstr},
    operand::{Name, Operand},
    terminator::ObTerminator,
    types::DynType,
};

/// SSA well-formedness violations reported by [`ObFunction::check_ssa`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("SSA name %{duplicate} is defined more than once")]
    DuplicateName { duplicate: Name },
    #[error("SSA name %{undefined} is referenced but never defined")]
    UndefinedName { undefined: Name },
    #[error("region has no blocks")]
    EmptyRegion,
}

/// A block: typed parameters, a straight-line instruction sequence and a
/// terminator. Nested control flow lives in the instructions' regions.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Block {
    pub params: Vec<(Name, DynType)>,
    pub instructions: Vec<ObInstr>,
    pub terminator: ObTerminator,
}

impl Block {
    /// Append an instruction, returning its primary destination if any.
    pub fn push(&mut self, instr: impl Into<ObInstr>) -> Option<Name> {
        let instr = instr.into();
        let dest = instr.destination();
        self.instructions.push(instr);
        dest
    }
}

/// A region nested under an instruction. The entry block is `blocks[0]`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    pub blocks: Vec<Block>,
}

impl Region {
    pub fn single(block: Block) -> Self {
        Region {
            blocks: vec![block],
        }
    }

    pub fn entry(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn entry_mut(&mut self) -> Option<&mut Block> {
        self.blocks.first_mut()
    }
}

/// A function: one per imported method.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObFunction {
    pub name: String,
    pub params: Vec<(Name, DynType)>,
    pub return_types: Vec<DynType>,
    pub body: Block,
}

impl ObFunction {
    /// Find the next available SSA [`Name`], scanning parameters and every
    /// instruction result including those inside nested regions.
    pub fn next_available_name(&self) -> Name {
        let mut max_index = 0;
        for (name, _) in &self.params {
            max_index = max_index.max(name.0);
        }
        fn scan_block(block: &Block, max_index: &mut u32) {
            for (name, _) in &block.params {
                *max_index = (*max_index).max(name.0);
            }
            for instr in &block.instructions {
                for name in instr.results() {
                    *max_index = (*max_index).max(name.0);
                }
                for region in instr.regions() {
                    for nested in &region.blocks {
                        scan_block(nested, max_index);
                    }
                }
            }
        }
        scan_block(&self.body, &mut max_index);
        Name(max_index + 1)
    }

    /// Verify SSA form:
    /// 1) Each name is defined exactly once (parameters, instruction results
    ///    and region block parameters all count as definitions).
    /// 2) Each operand, including terminator operands and operands inside
    ///    nested regions, refers to a defined name.
    pub fn check_ssa(&self) -> Result<(), VerifyError> {
        let mut defined = BTreeSet::new();

        for (name, _) in &self.params {
            if !defined.insert(*name) {
                return Err(VerifyError::DuplicateName { duplicate: *name });
            }
        }
        collect_definitions(&self.body, &mut defined)?;
        check_uses(&self.body, &defined)
    }
}

fn collect_definitions(block: &Block, defined: &mut BTreeSet<Name>) -> Result<(), VerifyError> {
    for (name, _) in &block.params {
        if !defined.insert(*name) {
            return Err(VerifyError::DuplicateName { duplicate: *name });
        }
    }
    for instr in &block.instructions {
        for name in instr.results() {
            if !defined.insert(name) {
                return Err(VerifyError::DuplicateName { duplicate: name });
            }
        }
        for region in instr.regions() {
            if region.blocks.is_empty() {
                return Err(VerifyError::EmptyRegion);
            }
            for nested in &region.blocks {
                collect_definitions(nested, defined)?;
            }
        }
    }
    Ok(())
}

fn check_uses(block: &Block, defined: &BTreeSet<Name>) -> Result<(), VerifyError> {
    for instr in &block.instructions {
        for name in instr.name_dependencies() {
            if !defined.contains(&name) {
                return Err(VerifyError::UndefinedName { undefined: name });
            }
        }
        for region in instr.regions() {
            for nested in &region.blocks {
                check_uses(nested, defined)?;
            }
        }
    }
    for name in block.terminator.dependencies() {
        if !defined.contains(&name) {
            return Err(VerifyError::UndefinedName { undefined: name });
        }
    }
    Ok(())
}

/// A translation unit: the module initializer (object construction
/// sequence) plus one function per imported method.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObModule {
    /// Construction instructions for the instantiated object graph, in
    /// bottom-up order (children before parents).
    pub init: Vec<ObInstr>,
    pub functions: Vec<ObFunction>,
}

impl ObModule {
    /// Names defined by the initializer sequence, in emission order.
    pub fn init_results(&self) -> impl Iterator<Item = Name> + '_ {
        self.init.iter().flat_map(|instr| instr.results())
    }

    /// Registers referenced by the initializer sequence.
    pub fn init_dependencies(&self) -> impl Iterator<Item = Name> + '_ {
        self.init.iter().flat_map(|instr| {
            instr
                .operands()
                .filter_map(|op| match op {
                    Operand::Reg(name) => Some(*name),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
    }
}
