//! The dynamic-language type model.
//!
//! Source programs are duck-typed: a value statically known as a narrower
//! type may flow into a wider use site without any visible operation. The
//! static form forbids that, so every implicit subtype substitution becomes
//! an explicit `bridge` instruction (see `instr::Bridge`). The
//! [`DynType::is_subtype_of`] relation below is the single authority for
//! where those bridges are legal.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use strum::EnumIs;

new_key_type! {
    /// Stable identity of a class description.
    ///
    /// All class lookups go through this key, never through the class name:
    /// two classes may share a name in different scopes. Keys are allocated
    /// by the frontend's class arena and remain valid for the lifetime of
    /// the translation unit.
    pub struct ClassKey;
}

/// A type as seen by the dynamic source language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DynType {
    Bool,
    Int,
    Float,
    Str,
    /// The unit/none type. Subtype of every `Optional`.
    NoneType,
    /// Fixed-arity heterogeneous tuple.
    Tuple(Vec<DynType>),
    /// Homogeneous growable list. Invariant in its element type.
    List(Box<DynType>),
    /// Either a value of the inner type or none.
    Optional(Box<DynType>),
    /// Tensor-like multi-dimensional value. Element typing is out of scope
    /// here; the importer treats all tensors as one type.
    Tensor,
    /// Instance of the class identified by the key. Nominal: two class types
    /// are related only when their keys are equal.
    Class(ClassKey),
}

impl DynType {
    /// Whether a value of `self` may be used where `other` is expected
    /// without any runtime operation.
    ///
    /// The relation is reflexive. `T <= Optional<T>` and
    /// `NoneType <= Optional<T>` for any `T`; tuples are covariant
    /// element-wise at equal arity; lists are invariant; everything else
    /// relates only by equality.
    pub fn is_subtype_of(&self, other: &DynType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (DynType::Optional(a), DynType::Optional(b)) => a.is_subtype_of(b),
            (DynType::NoneType, DynType::Optional(_)) => true,
            (_, DynType::Optional(inner)) => self.is_subtype_of(inner),
            (DynType::Tuple(a), DynType::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_subtype_of(y))
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for DynType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DynType::Bool => write!(f, "bool"),
            DynType::Int => write!(f, "int"),
            DynType::Float => write!(f, "float"),
            DynType::Str => write!(f, "str"),
            DynType::NoneType => write!(f, "none"),
            DynType::Tuple(elems) => {
                write!(f, "tuple<")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ">")
            }
            DynType::List(elem) => write!(f, "list<{}>", elem),
            DynType::Optional(inner) => write!(f, "optional<{}>", inner),
            DynType::Tensor => write!(f, "tensor"),
            DynType::Class(key) => write!(f, "class<{:?}>", key),
        }
    }
}

/// Resolves a [`ClassKey`] to a human-readable class name.
///
/// The instruction crate has no access to class descriptions; renderers that
/// want qualified names in their output pass an implementation of this trait
/// (the frontend's arena implements it).
pub trait ClassNames {
    fn class_name(&self, key: ClassKey) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn key() -> ClassKey {
        let mut map: SlotMap<ClassKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn subtyping_is_reflexive() {
        let tys = [
            DynType::Int,
            DynType::Tuple(vec![DynType::Int, DynType::Str]),
            DynType::List(Box::new(DynType::Float)),
            DynType::Class(key()),
        ];
        for ty in &tys {
            assert!(ty.is_subtype_of(ty));
        }
    }

    #[test]
    fn optional_admits_inner_and_none() {
        let opt_int = DynType::Optional(Box::new(DynType::Int));
        assert!(DynType::Int.is_subtype_of(&opt_int));
        assert!(DynType::NoneType.is_subtype_of(&opt_int));
        assert!(!DynType::Str.is_subtype_of(&opt_int));
        assert!(!opt_int.is_subtype_of(&DynType::Int));
    }

    #[test]
    fn tuples_are_covariant_at_equal_arity() {
        let narrow = DynType::Tuple(vec![DynType::NoneType, DynType::Int]);
        let wide = DynType::Tuple(vec![
            DynType::Optional(Box::new(DynType::Str)),
            DynType::Int,
        ]);
        assert!(narrow.is_subtype_of(&wide));
        assert!(!wide.is_subtype_of(&narrow));

        let short = DynType::Tuple(vec![DynType::Int]);
        assert!(!short.is_subtype_of(&wide));
    }

    #[test]
    fn lists_are_invariant() {
        let list_int = DynType::List(Box::new(DynType::Int));
        let list_opt = DynType::List(Box::new(DynType::Optional(Box::new(DynType::Int))));
        assert!(!list_int.is_subtype_of(&list_opt));
    }

    #[test]
    fn class_subtyping_is_nominal() {
        let mut map: SlotMap<ClassKey, ()> = SlotMap::with_key();
        let a = DynType::Class(map.insert(()));
        let b = DynType::Class(map.insert(()));
        assert!(a.is_subtype_of(&a));
        assert!(!a.is_subtype_of(&b));
    }
}
