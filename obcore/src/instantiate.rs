//! Bottom-up instantiation of an object graph into module form.
//!
//! Given a root object, emits the construction sequence for the whole
//! reachable object graph (children strictly before parents) and imports the
//! methods of every reachable class. Submodules referenced from several
//! attributes are constructed exactly once and every referencing slot reuses
//! the one constructed value, so reference identity in the source graph
//! survives into the module.
//!
//! The object graph must be acyclic. Back-references through shared
//! submodules are fine; a true cycle cannot be built bottom-up and is
//! rejected.
use std::collections::BTreeSet;

use log::{debug, info};
use obinstr::{
    block::{Block, ObModule, Region},
    instr::{BuildList, BuildTuple, Construct, ObInstr, SlotInit},
    operand::{Const, Name, Operand},
    terminator::SlotDone,
    types::{ClassKey, DynType},
};
use slotmap::SecondaryMap;

use crate::{
    annotate::ClassAnnotator,
    class::{Arenas, ObjectKey, SlotValue},
    error::{ObError, ObResult},
    importer::GraphImporter,
};

/// Drives one instantiation. Holds the visited map that gives shared
/// submodules their single construction.
pub struct ModuleInstantiator<'a> {
    arenas: &'a Arenas,
    /// Objects already constructed, mapped to the name holding them.
    constructed: SecondaryMap<ObjectKey, Name>,
    /// Objects currently on the construction stack, for cycle detection.
    in_flight: BTreeSet<ObjectKey>,
    /// Classes in first-visit order, for deterministic method import.
    classes: Vec<ClassKey>,
    next_name: u32,
}

impl<'a> ModuleInstantiator<'a> {
    pub fn new(arenas: &'a Arenas) -> Self {
        ModuleInstantiator {
            arenas,
            constructed: SecondaryMap::new(),
            in_flight: BTreeSet::new(),
            classes: Vec::new(),
            next_name: 0,
        }
    }

    fn fresh(&mut self) -> Name {
        let name = Name(self.next_name);
        self.next_name += 1;
        name
    }

    /// Instantiate the object graph rooted at `root` and import every
    /// reachable class's methods.
    pub fn import_module(&mut self, root: ObjectKey) -> ObResult<ObModule> {
        self.import_module_inner(root, None)
    }

    /// Like [`import_module`](Self::import_module), but only methods the
    /// annotation overlay marks as exported are imported. The construction
    /// sequence is unaffected: slots are populated regardless of export
    /// state.
    pub fn import_module_pruned(
        &mut self,
        root: ObjectKey,
        annotator: &ClassAnnotator,
    ) -> ObResult<ObModule> {
        self.import_module_inner(root, Some(annotator))
    }

    fn import_module_inner(
        &mut self,
        root: ObjectKey,
        annotator: Option<&ClassAnnotator>,
    ) -> ObResult<ObModule> {
        let mut init = Vec::new();
        self.instantiate(root, &mut init)?;

        let mut functions = Vec::new();
        for class in self.classes.clone() {
            let descr = self.arenas.class(class)?;
            for (index, method) in descr.methods.iter().enumerate() {
                if let Some(annotator) = annotator {
                    if !annotator.is_method_exported(class, index, self.arenas)? {
                        debug!("skipping unexported method '{}.{}'", descr.name, method.name);
                        continue;
                    }
                }
                let mut importer = GraphImporter::new(self.arenas);
                functions.push(importer.import_method(&descr.name, method)?);
            }
        }

        info!(
            "instantiated module graph: {} object(s), {} class(es), {} function(s)",
            self.constructed.len(),
            self.classes.len(),
            functions.len()
        );
        Ok(ObModule { init, functions })
    }

    /// Construct `object` (and, first, everything it references) into `out`
    /// and return the name holding it. Repeat visits return the existing
    /// name without emitting anything.
    pub fn instantiate(&mut self, object: ObjectKey, out: &mut Vec<ObInstr>) -> ObResult<Name> {
        if let Some(name) = self.constructed.get(object) {
            return Ok(*name);
        }
        let arenas = self.arenas;
        let instance = arenas.object(object)?;
        let descr = arenas.class(instance.class)?;
        if !self.in_flight.insert(object) {
            return Err(ObError::SlotMismatch {
                class: descr.name.clone(),
                detail: "object graph is cyclic; objects must form a DAG".to_string(),
            });
        }

        if !self.classes.contains(&instance.class) {
            self.classes.push(instance.class);
        }
        if instance.slots.len() != descr.attributes.len() {
            self.in_flight.remove(&object);
            return Err(ObError::SlotMismatch {
                class: descr.name.clone(),
                detail: format!(
                    "expected {} slot value(s), found {}",
                    descr.attributes.len(),
                    instance.slots.len()
                ),
            });
        }

        let mut slot_instrs = Vec::with_capacity(descr.attributes.len());
        for (attribute, slot) in descr.attributes.iter().zip(instance.slots.iter()) {
            if !slot.conforms_to(&attribute.ty, self.arenas) {
                self.in_flight.remove(&object);
                return Err(ObError::SlotMismatch {
                    class: descr.name.clone(),
                    detail: format!(
                        "slot '{}' declared as {} but the supplied value does not conform",
                        attribute.name, attribute.ty
                    ),
                });
            }
            let value = self.lower_slot_value(slot, &attribute.ty, out)?;
            slot_instrs.push(
                SlotInit {
                    name: attribute.name.clone(),
                    value,
                }
                .into(),
            );
        }

        let dest = self.fresh();
        debug!("constructing instance of '{}' into %{}", descr.name, dest.0);
        out.push(
            Construct {
                dest,
                class: instance.class,
                slots: Region::single(Block {
                    params: Vec::new(),
                    instructions: slot_instrs,
                    terminator: SlotDone.into(),
                }),
            }
            .into(),
        );
        self.in_flight.remove(&object);
        self.constructed.insert(object, dest);
        Ok(dest)
    }

    /// Lower one slot value to the operand that populates it. Aggregates
    /// emit their build instructions into `out` first; nested objects
    /// recurse through [`instantiate`](Self::instantiate).
    fn lower_slot_value(
        &mut self,
        value: &SlotValue,
        declared: &DynType,
        out: &mut Vec<ObInstr>,
    ) -> ObResult<Operand> {
        // Conformance was checked against the declared type; unwrap the
        // optional layer so aggregates see their element types.
        let declared = match declared {
            DynType::Optional(inner) if !matches!(value, SlotValue::None) => inner.as_ref(),
            other => other,
        };
        match (value, declared) {
            (SlotValue::Bool(b), _) => Ok(Operand::Imm(Const::Bool(*b))),
            (SlotValue::Int(i), _) => Ok(Operand::Imm(Const::Int(*i))),
            (SlotValue::Float(f), _) => Ok(Operand::Imm(Const::Float(*f))),
            (SlotValue::Str(s), _) => Ok(Operand::Imm(Const::Str(s.clone()))),
            (SlotValue::None, _) => Ok(Operand::Imm(Const::None)),
            (SlotValue::Tuple(elems), DynType::Tuple(tys)) => {
                let mut operands = Vec::with_capacity(elems.len());
                for (elem, ty) in elems.iter().zip(tys.iter()) {
                    operands.push(self.lower_slot_value(elem, ty, out)?);
                }
                let dest = self.fresh();
                out.push(
                    BuildTuple {
                        dest,
                        elems: operands,
                        tys: tys.clone(),
                    }
                    .into(),
                );
                Ok(Operand::Reg(dest))
            }
            (SlotValue::List(elems), DynType::List(elem_ty)) => {
                let mut operands = Vec::with_capacity(elems.len());
                for elem in elems {
                    operands.push(self.lower_slot_value(elem, elem_ty, out)?);
                }
                let dest = self.fresh();
                out.push(
                    BuildList {
                        dest,
                        elems: operands,
                        elem_ty: elem_ty.as_ref().clone(),
                    }
                    .into(),
                );
                Ok(Operand::Reg(dest))
            }
            (SlotValue::Object(key), _) => {
                let name = self.instantiate(*key, out)?;
                Ok(Operand::Reg(name))
            }
            // Unreachable after conforms_to, but keep the error total.
            (value, declared) => Err(ObError::SlotMismatch {
                class: String::new(),
                detail: format!("value {:?} cannot populate a slot of type {}", value, declared),
            }),
        }
    }
}
