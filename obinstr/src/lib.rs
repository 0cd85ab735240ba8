//! Static instruction vocabulary for the Obsidian importer.
//!
//! This crate defines the destination form that dynamic object programs are
//! translated into: a small SSA IR with explicit types, explicit subtype
//! bridging, and structured regions for loops and object construction.
//!
//! - `types`: the dynamic-language type model and its subtype relation
//! - `operand`: SSA names, labels, immediate constants and operands
//! - `instr`: all instruction kinds, unified by the [`instr::Instruction`]
//!   trait and the [`instr::ObInstr`] tagged union
//! - `terminator`: block terminators (`ret`, `yield`, `slot_done`)
//! - `block`: blocks, regions, functions and modules, plus SSA verification
//! - `fmt`: deterministic textual rendering

pub mod block;
pub mod fmt;
pub mod instr;
pub mod operand;
pub mod terminator;
pub mod types;
