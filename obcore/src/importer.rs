//! The graph-to-SSA importer.
//!
//! A single pass over a method's instruction graph: every operand is
//! resolved through the value scope, every instruction translates
//! one-to-one into the static form, and region-bearing instructions (loops)
//! recurse with a pushed scope frame. Where a value's established type and
//! a use site's required type disagree but stand in subtype relation, a
//! widening bridge is inserted; narrowing bridges are only ever emitted
//! where the source graph itself carries one.
//!
//! Any structural inconsistency aborts the import of the enclosing method
//! with a fatal error. The caller discards partial output; nothing is
//! patched up.
use std::collections::BTreeMap;

use log::{debug, trace};
use obinstr::{
    block::{Block, ObFunction, Region},
    instr::{
        Bridge, BridgeKind, BuildList, BuildTuple, CallMethod, ConstOp, GetAttr, GlobalGet,
        GlobalSet, LoopOp, NumToTensor, ObInstr, Print, Raise, SetAttr, Unpack,
    },
    operand::{Name, Operand},
    terminator::{ObTerminator, Ret, Yield},
    types::DynType,
};
use smallvec::SmallVec;

use crate::{
    class::{Arenas, ClassDescr, MethodDescr},
    error::{ObError, ObResult},
    graph::{SourceBlock, SourceInstr, SourceTerminator, SourceValue},
    scope::ValueScope,
};

/// Where a block's terminator is being synthesized, which decides the
/// destination terminator kind and the expected operand types.
enum TerminatorSite<'a> {
    /// Method body exit: a `return` becomes `ret`.
    Method {
        method: &'a str,
        return_tys: &'a [DynType],
    },
    /// Loop body exit: a `loop-continue` becomes `yield`.
    LoopBody { carried_tys: &'a [DynType] },
}

/// Imports one method graph at a time.
///
/// The importer owns its scope stack and name counter exclusively; it must
/// not be shared across concurrent imports. A caller driving several method
/// imports in parallel needs one importer instance per method.
pub struct GraphImporter<'a> {
    arenas: &'a Arenas,
    scope: ValueScope,
    /// Established static type of every emitted SSA value.
    types: BTreeMap<Name, DynType>,
    next_name: u32,
}

impl<'a> GraphImporter<'a> {
    pub fn new(arenas: &'a Arenas) -> Self {
        GraphImporter {
            arenas,
            scope: ValueScope::new(),
            types: BTreeMap::new(),
            next_name: 0,
        }
    }

    /// Translate one method body into an [`ObFunction`].
    ///
    /// `class_name` only decorates the produced function name and error
    /// messages; callee resolution goes through receiver types, never
    /// through this string.
    pub fn import_method(
        &mut self,
        class_name: &str,
        method: &MethodDescr,
    ) -> ObResult<ObFunction> {
        self.scope = ValueScope::new();
        self.types.clear();
        self.next_name = 0;

        let graph = &method.graph;
        let qualified = format!("{}.{}", class_name, method.name);
        debug!("importing method '{}'", qualified);

        let mut params = Vec::with_capacity(graph.entry.params.len());
        for (value, ty) in &graph.entry.params {
            let name = self.fresh(ty.clone());
            self.scope.bind(*value, name);
            params.push((name, ty.clone()));
        }

        let mut instructions = Vec::new();
        self.import_block(&graph.entry, &mut instructions)?;
        let terminator = self.synthesize_terminator(
            &graph.entry.terminator,
            TerminatorSite::Method {
                method: &qualified,
                return_tys: &graph.return_tys,
            },
            &mut instructions,
        )?;

        debug!(
            "imported method '{}' ({} instruction(s))",
            qualified,
            instructions.len()
        );
        Ok(ObFunction {
            name: qualified,
            params,
            return_types: graph.return_tys.clone(),
            body: Block {
                params: Vec::new(),
                instructions,
                terminator,
            },
        })
    }

    fn fresh(&mut self, ty: DynType) -> Name {
        let name = Name(self.next_name);
        self.next_name += 1;
        self.types.insert(name, ty);
        name
    }

    /// Resolve a source value to its destination operand and established
    /// type.
    fn resolve(&self, value: SourceValue) -> ObResult<(Operand, DynType)> {
        let name = self.scope.resolve(value)?;
        let ty = self
            .types
            .get(&name)
            .cloned()
            .ok_or(ObError::UnresolvedOperand { value })?;
        Ok((Operand::Reg(name), ty))
    }

    /// Make `operand` conform to `want`, inserting a widening bridge when
    /// the established type is a strict subtype of the required one.
    fn bridge_to(
        &mut self,
        operand: Operand,
        have: DynType,
        want: &DynType,
        context: &str,
        out: &mut Vec<ObInstr>,
    ) -> ObResult<Operand> {
        if &have == want {
            return Ok(operand);
        }
        if !have.is_subtype_of(want) {
            return Err(ObError::TypeConflict {
                context: context.to_string(),
                have,
                want: want.clone(),
            });
        }
        trace!("widening {} -> {} at {}", have, want, context);
        let dest = self.fresh(want.clone());
        out.push(
            Bridge {
                dest,
                value: operand,
                from: have,
                to: want.clone(),
                kind: BridgeKind::Widen,
            }
            .into(),
        );
        Ok(Operand::Reg(dest))
    }

    /// Resolve the class description behind an object-typed value.
    fn receiver_class(&self, have: &DynType, context: &str) -> ObResult<&'a ClassDescr> {
        let arenas = self.arenas;
        match have {
            DynType::Class(key) => arenas.class(*key),
            other => Err(ObError::NotAnObject {
                context: context.to_string(),
                have: other.clone(),
            }),
        }
    }

    fn import_block(&mut self, block: &SourceBlock, out: &mut Vec<ObInstr>) -> ObResult<()> {
        for instr in &block.instructions {
            self.import_instr(instr, out)?;
        }
        Ok(())
    }

    fn import_instr(&mut self, instr: &SourceInstr, out: &mut Vec<ObInstr>) -> ObResult<()> {
        match instr {
            SourceInstr::Constant { dest, value, ty } => {
                let name = self.fresh(ty.clone());
                out.push(
                    ConstOp {
                        dest: name,
                        value: value.clone(),
                        ty: ty.clone(),
                    }
                    .into(),
                );
                self.scope.bind(*dest, name);
            }
            SourceInstr::GetAttr { dest, object, name } => {
                let (object_op, object_ty) = self.resolve(*object)?;
                let context = format!("get_attr '{}'", name);
                let descr = self.receiver_class(&object_ty, &context)?;
                let attr = descr
                    .attribute(name)
                    .ok_or_else(|| ObError::UnknownMember {
                        class: descr.name.clone(),
                        member: name.clone(),
                    })?;
                let result = self.fresh(attr.ty.clone());
                out.push(
                    GetAttr {
                        dest: result,
                        object: object_op,
                        name: name.clone(),
                        ty: attr.ty.clone(),
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::SetAttr {
                object,
                name,
                value,
            } => {
                let (object_op, object_ty) = self.resolve(*object)?;
                let (value_op, value_ty) = self.resolve(*value)?;
                let context = format!("set_attr '{}'", name);
                let descr = self.receiver_class(&object_ty, &context)?;
                let attr = descr
                    .attribute(name)
                    .ok_or_else(|| ObError::UnknownMember {
                        class: descr.name.clone(),
                        member: name.clone(),
                    })?;
                let declared = attr.ty.clone();
                let value_op = self.bridge_to(value_op, value_ty, &declared, &context, out)?;
                out.push(
                    SetAttr {
                        object: object_op,
                        name: name.clone(),
                        value: value_op,
                    }
                    .into(),
                );
            }
            SourceInstr::CallMethod {
                dest,
                receiver,
                name,
                args,
            } => {
                let (receiver_op, receiver_ty) = self.resolve(*receiver)?;
                let context = format!("call_method '{}'", name);
                let descr = self.receiver_class(&receiver_ty, &context)?;
                let DynType::Class(class_key) = receiver_ty else {
                    unreachable!("receiver_class accepted a non-class type");
                };
                let callee = descr.method(name).ok_or_else(|| ObError::UnknownMember {
                    class: descr.name.clone(),
                    member: name.clone(),
                })?;
                // Callee entry params: receiver first, then the declared
                // arguments.
                let callee_params = &callee.graph.entry.params;
                if args.len() + 1 != callee_params.len() {
                    return Err(ObError::ArityMismatch {
                        context: format!("call to '{}.{}'", descr.name, name),
                        expected: callee_params.len().saturating_sub(1),
                        actual: args.len(),
                    });
                }
                let mut call_args: SmallVec<[Operand; 4]> = SmallVec::new();
                for (arg, (_, want)) in args.iter().zip(callee_params.iter().skip(1)) {
                    let (arg_op, arg_ty) = self.resolve(*arg)?;
                    call_args.push(self.bridge_to(arg_op, arg_ty, want, &context, out)?);
                }
                let result_ty = callee.graph.return_tys.first().cloned();
                if dest.is_some() && result_ty.is_none() {
                    return Err(ObError::ArityMismatch {
                        context: format!("results of call to '{}.{}'", descr.name, name),
                        expected: 0,
                        actual: 1,
                    });
                }
                let result = match (dest, &result_ty) {
                    (Some(_), Some(ty)) => Some(self.fresh(ty.clone())),
                    _ => None,
                };
                out.push(
                    CallMethod {
                        dest: result,
                        receiver: receiver_op,
                        class: class_key,
                        name: name.clone(),
                        args: call_args.into_vec(),
                        ty: result_ty,
                    }
                    .into(),
                );
                if let (Some(dest), Some(result)) = (dest, result) {
                    self.scope.bind(*dest, result);
                }
            }
            SourceInstr::Print { args } => {
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push(self.resolve(*arg)?.0);
                }
                out.push(Print { args: operands }.into());
            }
            SourceInstr::Raise { exception } => {
                let (exception, _) = self.resolve(*exception)?;
                out.push(Raise { exception }.into());
            }
            SourceInstr::Widen { dest, value, to } => {
                let (value_op, have) = self.resolve(*value)?;
                if !have.is_subtype_of(to) {
                    return Err(ObError::TypeConflict {
                        context: "widen".to_string(),
                        have,
                        want: to.clone(),
                    });
                }
                let result = self.fresh(to.clone());
                out.push(
                    Bridge {
                        dest: result,
                        value: value_op,
                        from: have,
                        to: to.clone(),
                        kind: BridgeKind::Widen,
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::Narrow { dest, value, to } => {
                // The narrower fact is vouched for upstream; no check here.
                let (value_op, have) = self.resolve(*value)?;
                let result = self.fresh(to.clone());
                out.push(
                    Bridge {
                        dest: result,
                        value: value_op,
                        from: have,
                        to: to.clone(),
                        kind: BridgeKind::Narrow,
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::TupleUnpack { dests, value, tys } => {
                let (value_op, have) = self.resolve(*value)?;
                if dests.len() != tys.len() {
                    return Err(ObError::ArityMismatch {
                        context: "tuple unpack (declared element types)".to_string(),
                        expected: dests.len(),
                        actual: tys.len(),
                    });
                }
                match &have {
                    DynType::Tuple(elems) => {
                        if elems.len() != dests.len() {
                            return Err(ObError::ArityMismatch {
                                context: "tuple unpack".to_string(),
                                expected: dests.len(),
                                actual: elems.len(),
                            });
                        }
                    }
                    other => {
                        return Err(ObError::TypeConflict {
                            context: "tuple unpack".to_string(),
                            have: other.clone(),
                            want: DynType::Tuple(tys.clone()),
                        });
                    }
                }
                let mut names = Vec::with_capacity(dests.len());
                for ty in tys {
                    names.push(self.fresh(ty.clone()));
                }
                out.push(
                    Unpack {
                        dests: names.clone(),
                        value: value_op,
                        tys: tys.clone(),
                    }
                    .into(),
                );
                for (dest, name) in dests.iter().zip(names) {
                    self.scope.bind(*dest, name);
                }
            }
            SourceInstr::BuildTuple { dest, elems, tys } => {
                if elems.len() != tys.len() {
                    return Err(ObError::ArityMismatch {
                        context: "build_tuple".to_string(),
                        expected: tys.len(),
                        actual: elems.len(),
                    });
                }
                let mut operands = Vec::with_capacity(elems.len());
                for (elem, want) in elems.iter().zip(tys.iter()) {
                    let (op, have) = self.resolve(*elem)?;
                    operands.push(self.bridge_to(op, have, want, "build_tuple", out)?);
                }
                let result = self.fresh(DynType::Tuple(tys.clone()));
                out.push(
                    BuildTuple {
                        dest: result,
                        elems: operands,
                        tys: tys.clone(),
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::BuildList {
                dest,
                elems,
                elem_ty,
            } => {
                let mut operands = Vec::with_capacity(elems.len());
                for elem in elems {
                    let (op, have) = self.resolve(*elem)?;
                    operands.push(self.bridge_to(op, have, elem_ty, "build_list", out)?);
                }
                let result = self.fresh(DynType::List(Box::new(elem_ty.clone())));
                out.push(
                    BuildList {
                        dest: result,
                        elems: operands,
                        elem_ty: elem_ty.clone(),
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::NumToTensor { dest, value } => {
                let (value_op, _) = self.resolve(*value)?;
                let result = self.fresh(DynType::Tensor);
                out.push(
                    NumToTensor {
                        dest: result,
                        value: value_op,
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::Loop {
                dests,
                max_trip_count,
                init_cond,
                init_values,
                carried_tys,
                body,
            } => {
                self.import_loop(
                    dests,
                    *max_trip_count,
                    *init_cond,
                    init_values,
                    carried_tys,
                    body,
                    out,
                )?;
            }
            SourceInstr::GlobalGet { dest, name, ty } => {
                let result = self.fresh(ty.clone());
                out.push(
                    GlobalGet {
                        dest: result,
                        name: name.clone(),
                        ty: ty.clone(),
                    }
                    .into(),
                );
                self.scope.bind(*dest, result);
            }
            SourceInstr::GlobalSet { name, value } => {
                let (value_op, _) = self.resolve(*value)?;
                out.push(
                    GlobalSet {
                        name: name.clone(),
                        value: value_op,
                    }
                    .into(),
                );
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn import_loop(
        &mut self,
        dests: &[SourceValue],
        max_trip_count: SourceValue,
        init_cond: SourceValue,
        init_values: &[SourceValue],
        carried_tys: &[DynType],
        body: &SourceBlock,
        out: &mut Vec<ObInstr>,
    ) -> ObResult<()> {
        if init_values.len() != carried_tys.len() {
            return Err(ObError::ArityMismatch {
                context: "loop initial carried values".to_string(),
                expected: carried_tys.len(),
                actual: init_values.len(),
            });
        }
        if dests.len() != carried_tys.len() {
            return Err(ObError::ArityMismatch {
                context: "loop results".to_string(),
                expected: carried_tys.len(),
                actual: dests.len(),
            });
        }
        // Body entry block: iteration index plus one parameter per carried
        // value.
        if body.params.len() != carried_tys.len() + 1 {
            return Err(ObError::ArityMismatch {
                context: "loop body block parameters".to_string(),
                expected: carried_tys.len() + 1,
                actual: body.params.len(),
            });
        }

        let (trip_op, trip_ty) = self.resolve(max_trip_count)?;
        let trip_op = self.bridge_to(trip_op, trip_ty, &DynType::Int, "loop trip count", out)?;
        let (cond_op, cond_ty) = self.resolve(init_cond)?;
        let cond_op = self.bridge_to(cond_op, cond_ty, &DynType::Bool, "loop condition", out)?;
        let mut inits = Vec::with_capacity(init_values.len());
        for (value, want) in init_values.iter().zip(carried_tys.iter()) {
            let (op, have) = self.resolve(*value)?;
            inits.push(self.bridge_to(op, have, want, "loop initial carried values", out)?);
        }

        // Fresh region-local values for the body parameters, bound in a new
        // scope frame.
        self.scope.push();
        let mut params = Vec::with_capacity(body.params.len());
        for (value, ty) in &body.params {
            let name = self.fresh(ty.clone());
            self.scope.bind(*value, name);
            params.push((name, ty.clone()));
        }

        let mut body_instrs = Vec::new();
        let result = self
            .import_block(body, &mut body_instrs)
            .and_then(|()| {
                self.synthesize_terminator(
                    &body.terminator,
                    TerminatorSite::LoopBody { carried_tys },
                    &mut body_instrs,
                )
            });
        self.scope.pop();
        let terminator = result?;

        let mut dest_names = Vec::with_capacity(dests.len());
        for (dest, ty) in dests.iter().zip(carried_tys.iter()) {
            let name = self.fresh(ty.clone());
            self.scope.bind(*dest, name);
            dest_names.push(name);
        }
        out.push(
            LoopOp {
                dests: dest_names,
                max_trip_count: trip_op,
                init_cond: cond_op,
                init_values: inits,
                carried_tys: carried_tys.to_vec(),
                body: Region::single(Block {
                    params,
                    instructions: body_instrs,
                    terminator,
                }),
            }
            .into(),
        );
        Ok(())
    }

    /// Terminator synthesis: map a source block exit onto the destination
    /// terminator its position requires, wiring successor operands.
    fn synthesize_terminator(
        &mut self,
        terminator: &SourceTerminator,
        site: TerminatorSite<'_>,
        out: &mut Vec<ObInstr>,
    ) -> ObResult<ObTerminator> {
        match (terminator, site) {
            (
                SourceTerminator::Return { values },
                TerminatorSite::Method { method, return_tys },
            ) => {
                if values.len() != return_tys.len() {
                    return Err(ObError::ArityMismatch {
                        context: format!("return of '{}'", method),
                        expected: return_tys.len(),
                        actual: values.len(),
                    });
                }
                let mut operands = Vec::with_capacity(values.len());
                for (value, want) in values.iter().zip(return_tys.iter()) {
                    let (op, have) = self.resolve(*value)?;
                    operands.push(self.bridge_to(
                        op,
                        have,
                        want,
                        &format!("return of '{}'", method),
                        out,
                    )?);
                }
                Ok(Ret { values: operands }.into())
            }
            (
                SourceTerminator::LoopContinue { cond, values },
                TerminatorSite::LoopBody { carried_tys },
            ) => {
                if values.len() != carried_tys.len() {
                    return Err(ObError::ArityMismatch {
                        context: "loop yield".to_string(),
                        expected: carried_tys.len(),
                        actual: values.len(),
                    });
                }
                let (cond_op, cond_ty) = self.resolve(*cond)?;
                let cond_op = self.bridge_to(cond_op, cond_ty, &DynType::Bool, "loop yield", out)?;
                let mut operands = Vec::with_capacity(values.len());
                for (value, want) in values.iter().zip(carried_tys.iter()) {
                    let (op, have) = self.resolve(*value)?;
                    operands.push(self.bridge_to(op, have, want, "loop yield", out)?);
                }
                Ok(Yield {
                    cond: cond_op,
                    values: operands,
                }
                .into())
            }
            (SourceTerminator::LoopContinue { .. }, TerminatorSite::Method { method, .. }) => {
                Err(ObError::MalformedTerminator {
                    context: format!("loop-continue outside a loop body in '{}'", method),
                })
            }
            (SourceTerminator::Return { .. }, TerminatorSite::LoopBody { .. }) => {
                Err(ObError::MalformedTerminator {
                    context: "return inside a loop body".to_string(),
                })
            }
        }
    }
}
