//! Instruction kinds of the static form.
//!
//! Each instruction is a small data structure with public fields, making it
//! easy to construct and inspect. The [`Instruction`] trait provides
//! zero-allocation iteration over input operands and access to the produced
//! SSA names; [`ObInstr`] is the tagged union over all concrete forms.
//!
//! Two instruction kinds carry nested regions: [`LoopOp`] (loop body) and
//! [`Construct`] (slot initializer list). The importer recurses into those
//! regions with a fresh value scope.
use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

use crate::{
    block::Region,
    operand::{Const, Name, Operand},
    types::{ClassKey, DynType},
};

/// Common interface implemented by every instruction node.
pub trait Instruction {
    /// Iterate over all input operands for this instruction. Operands inside
    /// nested regions are not included; walk the regions explicitly.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Mutably iterate over all input operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// The primary destination SSA name, if the instruction produces exactly
    /// one result. Multi-result instructions return `None` here and list all
    /// names in [`Instruction::results`].
    fn destination(&self) -> Option<Name> {
        None
    }

    /// Update the primary destination. No-op if the instruction has none.
    fn set_destination(&mut self, _name: Name) {}

    /// All SSA names defined by this instruction, in result order.
    fn results(&self) -> SmallVec<[Name; 2]> {
        self.destination().into_iter().collect()
    }

    /// The static type of the primary result, when it has one.
    fn result_type(&self) -> Option<DynType> {
        None
    }

    /// Convenience iterator over referenced SSA names (register operands).
    /// Immediates are ignored.
    fn name_dependencies(&self) -> impl Iterator<Item = Name> {
        self.operands().filter_map(|op| match op {
            Operand::Reg(name) => Some(*name),
            _ => None,
        })
    }
}

/// Materialize an immediate constant as an SSA value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstOp {
    pub dest: Name,
    pub value: Const,
    pub ty: DynType,
}

impl Instruction for ConstOp {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(self.ty.clone())
    }
}

/// Read an attribute slot of an object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GetAttr {
    pub dest: Name,
    pub object: Operand,
    pub name: String,
    /// The attribute's declared type, carried through unchanged from the
    /// class description.
    pub ty: DynType,
}

impl Instruction for GetAttr {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.object)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.object)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(self.ty.clone())
    }
}

/// Write an attribute slot of an object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SetAttr {
    pub object: Operand,
    pub name: String,
    pub value: Operand,
}

impl Instruction for SetAttr {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.object, &self.value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.object, &mut self.value].into_iter()
    }
}

/// Dynamic method call.
///
/// The callee is resolved purely by (receiver class identity, method name);
/// the call is never inlined or specialized here.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CallMethod {
    pub dest: Option<Name>,
    pub receiver: Operand,
    pub class: ClassKey,
    pub name: String,
    pub args: Vec<Operand>,
    /// Return type, `None` for void methods.
    pub ty: Option<DynType>,
}

impl Instruction for CallMethod {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.receiver).chain(self.args.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.receiver).chain(self.args.iter_mut())
    }

    fn destination(&self) -> Option<Name> {
        self.dest
    }

    fn set_destination(&mut self, name: Name) {
        // Cannot turn a void call into a value-producing one.
        if self.dest.is_some() {
            self.dest = Some(name);
        }
    }

    fn result_type(&self) -> Option<DynType> {
        self.ty.clone()
    }
}

/// Print side effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Print {
    pub args: Vec<Operand>,
}

impl Instruction for Print {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.args.iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.args.iter_mut()
    }
}

/// Raise an exception. Never produces a value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Raise {
    pub exception: Operand,
}

impl Instruction for Raise {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.exception)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.exception)
    }
}

/// Direction of a subtype bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BridgeKind {
    /// Assert that a value of a narrower type may flow to a wider use site.
    /// Always legal when `from.is_subtype_of(to)` holds; side-effect free.
    Widen,
    /// Assert, without any runtime check, that a value statically known only
    /// as the wider `from` type is in fact of the narrower `to` type. An
    /// incorrect narrow is undefined behavior downstream; emitters must hold
    /// independent evidence for the narrower fact.
    Narrow,
}

/// Explicit subtype bridge.
///
/// Every point of implicit subtype substitution in the source program
/// becomes one of these in the static form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bridge {
    pub dest: Name,
    pub value: Operand,
    pub from: DynType,
    pub to: DynType,
    pub kind: BridgeKind,
}

impl Instruction for Bridge {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(self.to.clone())
    }
}

/// Decompose a tuple-like value into its elements, one destination per
/// element in source order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Unpack {
    pub dests: Vec<Name>,
    pub value: Operand,
    pub tys: Vec<DynType>,
}

impl Instruction for Unpack {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }

    fn results(&self) -> SmallVec<[Name; 2]> {
        self.dests.iter().copied().collect()
    }
}

/// Build a tuple value from its elements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildTuple {
    pub dest: Name,
    pub elems: Vec<Operand>,
    pub tys: Vec<DynType>,
}

impl Instruction for BuildTuple {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.elems.iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.elems.iter_mut()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(DynType::Tuple(self.tys.clone()))
    }
}

/// Build a homogeneous list value from its elements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildList {
    pub dest: Name,
    pub elems: Vec<Operand>,
    pub elem_ty: DynType,
}

impl Instruction for BuildList {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.elems.iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.elems.iter_mut()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(DynType::List(Box::new(self.elem_ty.clone())))
    }
}

/// Convert a numeric scalar into a tensor-like value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumToTensor {
    pub dest: Name,
    pub value: Operand,
}

impl Instruction for NumToTensor {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(DynType::Tensor)
    }
}

/// Unified loop: runs while both the trip-count budget is not exhausted and
/// the continue condition holds. Covers bounded `for`-style iteration
/// (condition constantly true) and unbounded `while`-style iteration (trip
/// count set to the maximum) in one construct.
///
/// The body region's entry block takes the current iteration index (`int`)
/// followed by one parameter per loop-carried value, and must terminate with
/// a `yield` carrying the updated condition and carried values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoopOp {
    /// Final loop-carried values, one per entry of `init_values`.
    pub dests: Vec<Name>,
    pub max_trip_count: Operand,
    pub init_cond: Operand,
    pub init_values: Vec<Operand>,
    pub carried_tys: Vec<DynType>,
    pub body: Region,
}

impl Instruction for LoopOp {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.max_trip_count, &self.init_cond]
            .into_iter()
            .chain(self.init_values.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.max_trip_count, &mut self.init_cond]
            .into_iter()
            .chain(self.init_values.iter_mut())
    }

    fn results(&self) -> SmallVec<[Name; 2]> {
        self.dests.iter().copied().collect()
    }
}

/// Object construction.
///
/// Exactly one per instantiated object. The nested region holds one
/// [`SlotInit`] per attribute in declaration order and terminates with
/// `slot_done`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Construct {
    pub dest: Name,
    pub class: ClassKey,
    pub slots: Region,
}

impl Instruction for Construct {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(DynType::Class(self.class))
    }
}

/// Bind one attribute slot during construction. Only valid inside a
/// [`Construct`] region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotInit {
    pub name: String,
    pub value: Operand,
}

impl Instruction for SlotInit {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }
}

/// Read a process-wide named slot. Sharing, not copying: the produced value
/// aliases the stored one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalGet {
    pub dest: Name,
    pub name: String,
    pub ty: DynType,
}

impl Instruction for GlobalGet {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn result_type(&self) -> Option<DynType> {
        Some(self.ty.clone())
    }
}

/// Replace the value held by a process-wide named slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalSet {
    pub name: String,
    pub value: Operand,
}

impl Instruction for GlobalSet {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }
}

/// Discriminated union covering all instruction kinds.
///
/// Use this enum to store heterogeneous instruction streams and to
/// pattern-match on specific operations. The generated `ObInstrKind`
/// discriminant (via `strum`) can be helpful for fast classification.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(ObInstrKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObInstr {
    ConstOp(ConstOp),
    GetAttr(GetAttr),
    SetAttr(SetAttr),
    CallMethod(CallMethod),
    Print(Print),
    Raise(Raise),
    Bridge(Bridge),
    Unpack(Unpack),
    BuildTuple(BuildTuple),
    BuildList(BuildList),
    NumToTensor(NumToTensor),
    LoopOp(LoopOp),
    Construct(Construct),
    SlotInit(SlotInit),
    GlobalGet(GlobalGet),
    GlobalSet(GlobalSet),
}

impl ObInstr {
    /// Iterate over the nested regions of this instruction, if any.
    #[auto_enum(Iterator)]
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        match self {
            ObInstr::LoopOp(op) => std::iter::once(&op.body),
            ObInstr::Construct(op) => std::iter::once(&op.slots),
            _ => std::iter::empty(),
        }
    }
}

macro_rules! define_instr_any_instr {
    (
        $($variant:ident),*
    ) => {
        impl Instruction for ObInstr {
            #[auto_enum(Iterator)]
            fn operands(&self) -> impl Iterator<Item = &Operand> {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.operands(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.operands_mut(),
                    )*
                }
            }

            fn destination(&self) -> Option<Name> {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.destination(),
                    )*
                }
            }

            fn set_destination(&mut self, name: Name) {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.set_destination(name),
                    )*
                }
            }

            fn results(&self) -> SmallVec<[Name; 2]> {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.results(),
                    )*
                }
            }

            fn result_type(&self) -> Option<DynType> {
                match self {
                    $(
                        ObInstr::$variant(instr) => instr.result_type(),
                    )*
                }
            }
        }
    };
}

define_instr_any_instr! {
    ConstOp,
    GetAttr,
    SetAttr,
    CallMethod,
    Print,
    Raise,
    Bridge,
    Unpack,
    BuildTuple,
    BuildList,
    NumToTensor,
    LoopOp,
    Construct,
    SlotInit,
    GlobalGet,
    GlobalSet
}

macro_rules! define_obinstr_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for ObInstr {
            fn from(inst: $typ) -> Self {
                ObInstr::$variant(inst)
            }
        }
    };
}

define_obinstr_from!(ConstOp, ConstOp);
define_obinstr_from!(GetAttr, GetAttr);
define_obinstr_from!(SetAttr, SetAttr);
define_obinstr_from!(CallMethod, CallMethod);
define_obinstr_from!(Print, Print);
define_obinstr_from!(Raise, Raise);
define_obinstr_from!(Bridge, Bridge);
define_obinstr_from!(Unpack, Unpack);
define_obinstr_from!(BuildTuple, BuildTuple);
define_obinstr_from!(BuildList, BuildList);
define_obinstr_from!(NumToTensor, NumToTensor);
define_obinstr_from!(LoopOp, LoopOp);
define_obinstr_from!(Construct, Construct);
define_obinstr_from!(SlotInit, SlotInit);
define_obinstr_from!(GlobalGet, GlobalGet);
define_obinstr_from!(GlobalSet, GlobalSet);
