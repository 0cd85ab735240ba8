//! Class descriptions and object instance arenas.
//!
//! Classes and objects live in slotmap arenas; their keys are the stable
//! identities everything else is keyed by. Identity is never name-based
//! (two classes may share a name in different scopes) and keys are never
//! reallocated for the lifetime of a translation unit.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use obinstr::types::{ClassKey, ClassNames, DynType};
use slotmap::{SlotMap, new_key_type};

use crate::{
    error::{ObError, ObResult},
    graph::SourceGraph,
};

new_key_type! {
    /// Stable identity of an object instance.
    pub struct ObjectKey;
}

/// One attribute of a class: name, declared type, position given by the
/// index in the class's attribute list. Positions are stable for the
/// lifetime of a class description snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttributeDescr {
    pub name: String,
    pub ty: DynType,
}

/// One method of a class: name plus the instruction graph of its body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MethodDescr {
    pub name: String,
    pub graph: SourceGraph,
}

/// A class description: a named aggregate with ordered attributes and
/// ordered methods.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassDescr {
    pub name: String,
    pub attributes: Vec<AttributeDescr>,
    pub methods: Vec<MethodDescr>,
}

impl ClassDescr {
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescr> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|method| method.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescr> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// A concrete slot value held by an object instance.
///
/// Submodules appear as [`SlotValue::Object`] keys, so two attributes of the
/// same parent may reference the identical child: reference identity is
/// preserved by the arena, never duplicated by this model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SlotValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
    Tuple(Vec<SlotValue>),
    List(Vec<SlotValue>),
    Object(ObjectKey),
}

impl SlotValue {
    /// Whether this value may legally populate a slot declared with `ty`.
    ///
    /// Scalars match their own type; tuples check element-wise; lists check
    /// every element against the declared element type; objects match a
    /// class type when their class key is identical; any value matches an
    /// `Optional` whose inner type it conforms to, and `None` matches every
    /// `Optional`.
    pub fn conforms_to(&self, ty: &DynType, arenas: &Arenas) -> bool {
        match (self, ty) {
            (SlotValue::None, DynType::Optional(_)) => true,
            (_, DynType::Optional(inner)) => self.conforms_to(inner, arenas),
            (SlotValue::Bool(_), DynType::Bool) => true,
            (SlotValue::Int(_), DynType::Int) => true,
            (SlotValue::Float(_), DynType::Float) => true,
            (SlotValue::Str(_), DynType::Str) => true,
            (SlotValue::None, DynType::NoneType) => true,
            (SlotValue::Tuple(elems), DynType::Tuple(tys)) => {
                elems.len() == tys.len()
                    && elems
                        .iter()
                        .zip(tys.iter())
                        .all(|(elem, ty)| elem.conforms_to(ty, arenas))
            }
            (SlotValue::List(elems), DynType::List(elem_ty)) => {
                elems.iter().all(|elem| elem.conforms_to(elem_ty, arenas))
            }
            (SlotValue::Object(key), DynType::Class(class)) => arenas
                .objects
                .get(*key)
                .is_some_and(|object| object.class == *class),
            _ => false,
        }
    }
}

/// A fully-populated object instance: one concrete value per declared
/// attribute, in declaration order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectInstance {
    pub class: ClassKey,
    pub slots: Vec<SlotValue>,
}

/// Owning arenas for one translation unit.
#[derive(Debug, Default)]
pub struct Arenas {
    pub classes: SlotMap<ClassKey, ClassDescr>,
    pub objects: SlotMap<ObjectKey, ObjectInstance>,
}

impl Arenas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, descr: ClassDescr) -> ClassKey {
        self.classes.insert(descr)
    }

    pub fn add_object(&mut self, instance: ObjectInstance) -> ObjectKey {
        self.objects.insert(instance)
    }

    pub fn class(&self, key: ClassKey) -> ObResult<&ClassDescr> {
        self.classes
            .get(key)
            .ok_or(ObError::UnknownClass { class: key })
    }

    pub fn object(&self, key: ObjectKey) -> ObResult<&ObjectInstance> {
        self.objects
            .get(key)
            .ok_or(ObError::UnknownObject { object: key })
    }
}

impl ClassNames for Arenas {
    fn class_name(&self, key: ClassKey) -> Option<&str> {
        self.classes.get(key).map(|descr| descr.name.as_str())
    }
}
