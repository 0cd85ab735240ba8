//! Pretty-print helpers for instructions, blocks, functions and modules.
//!
//! Output is deterministic: members render in storage order and nested
//! regions indent by four spaces per level. The annotation dump and the
//! importer tests both rely on this.
use crate::{
    block::{Block, ObFunction, ObModule, Region},
    instr::{BridgeKind, Instruction, ObInstr},
    terminator::ObTerminator,
    types::{ClassKey, ClassNames, DynType},
};

const INDENT: &str = "    ";

fn write_indent(f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_class(
    f: &mut std::fmt::Formatter<'_>,
    key: ClassKey,
    classes: Option<&dyn ClassNames>,
) -> std::fmt::Result {
    match classes.and_then(|c| c.class_name(key)) {
        Some(name) => write!(f, "@{}", name),
        None => write!(f, "class<{:?}>", key),
    }
}

fn write_results(f: &mut std::fmt::Formatter<'_>, instr: &ObInstr) -> std::fmt::Result {
    let results = instr.results();
    for (i, name) in results.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "%{}", name)?;
    }
    if !results.is_empty() {
        write!(f, " = ")?;
    }
    Ok(())
}

fn write_ty_list(f: &mut std::fmt::Formatter<'_>, tys: &[DynType]) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, ty) in tys.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", ty)?;
    }
    write!(f, ")")
}

fn write_instr(
    f: &mut std::fmt::Formatter<'_>,
    instr: &ObInstr,
    classes: Option<&dyn ClassNames>,
    depth: usize,
) -> std::fmt::Result {
    write_indent(f, depth)?;
    write_results(f, instr)?;
    match instr {
        ObInstr::ConstOp(op) => write!(f, "const {} : {}", op.value, op.ty),
        ObInstr::GetAttr(op) => write!(f, "get_attr {}[{:?}] : {}", op.object, op.name, op.ty),
        ObInstr::SetAttr(op) => write!(f, "set_attr {}[{:?}], {}", op.object, op.name, op.value),
        ObInstr::CallMethod(op) => {
            write!(f, "call_method {}[{:?}](", op.receiver, op.name)?;
            for (i, arg) in op.args.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
            if let Some(ty) = &op.ty {
                write!(f, " : {}", ty)?;
            }
            Ok(())
        }
        ObInstr::Print(op) => {
            write!(f, "print")?;
            for (i, arg) in op.args.iter().enumerate() {
                write!(f, "{}{}", if i == 0 { " " } else { ", " }, arg)?;
            }
            Ok(())
        }
        ObInstr::Raise(op) => write!(f, "raise {}", op.exception),
        ObInstr::Bridge(op) => {
            let kind = match op.kind {
                BridgeKind::Widen => "widen",
                BridgeKind::Narrow => "narrow",
            };
            write!(f, "bridge.{} {} : {} -> {}", kind, op.value, op.from, op.to)
        }
        ObInstr::Unpack(op) => {
            write!(f, "unpack {} : ", op.value)?;
            write_ty_list(f, &op.tys)
        }
        ObInstr::BuildTuple(op) => {
            write!(f, "build_tuple ")?;
            for (i, elem) in op.elems.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", elem)?;
            }
            write!(f, " : ")?;
            write_ty_list(f, &op.tys)
        }
        ObInstr::BuildList(op) => {
            write!(f, "build_list ")?;
            for (i, elem) in op.elems.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", elem)?;
            }
            write!(f, " : list<{}>", op.elem_ty)
        }
        ObInstr::NumToTensor(op) => write!(f, "num_to_tensor {}", op.value),
        ObInstr::LoopOp(op) => {
            write!(f, "loop {}, {}, init(", op.max_trip_count, op.init_cond)?;
            for (i, value) in op.init_values.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, ") : ")?;
            write_ty_list(f, &op.carried_tys)?;
            write!(f, " ")?;
            write_region(f, &op.body, classes, depth)
        }
        ObInstr::Construct(op) => {
            write!(f, "construct ")?;
            write_class(f, op.class, classes)?;
            write!(f, " ")?;
            write_region(f, &op.slots, classes, depth)
        }
        ObInstr::SlotInit(op) => write!(f, "slot {:?}, {}", op.name, op.value),
        ObInstr::GlobalGet(op) => write!(f, "global_get @{} : {}", op.name, op.ty),
        ObInstr::GlobalSet(op) => write!(f, "global_set @{}, {}", op.name, op.value),
    }
}

fn write_terminator(
    f: &mut std::fmt::Formatter<'_>,
    terminator: &ObTerminator,
    depth: usize,
) -> std::fmt::Result {
    write_indent(f, depth)?;
    match terminator {
        ObTerminator::Ret(ret) => {
            write!(f, "ret")?;
            for (i, value) in ret.values.iter().enumerate() {
                write!(f, "{}{}", if i == 0 { " " } else { ", " }, value)?;
            }
            Ok(())
        }
        ObTerminator::Yield(y) => {
            write!(f, "yield {}", y.cond)?;
            for value in &y.values {
                write!(f, ", {}", value)?;
            }
            Ok(())
        }
        ObTerminator::SlotDone(_) => write!(f, "slot_done"),
    }
}

fn write_block(
    f: &mut std::fmt::Formatter<'_>,
    block: &Block,
    classes: Option<&dyn ClassNames>,
    depth: usize,
    label: usize,
) -> std::fmt::Result {
    if !block.params.is_empty() {
        write_indent(f, depth)?;
        write!(f, "^{}(", label)?;
        for (i, (name, ty)) in block.params.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "%{}: {}", name, ty)?;
        }
        writeln!(f, "):")?;
    }
    for instr in &block.instructions {
        write_instr(f, instr, classes, depth + 1)?;
        writeln!(f)?;
    }
    write_terminator(f, &block.terminator, depth + 1)?;
    writeln!(f)
}

fn write_region(
    f: &mut std::fmt::Formatter<'_>,
    region: &Region,
    classes: Option<&dyn ClassNames>,
    depth: usize,
) -> std::fmt::Result {
    writeln!(f, "{{")?;
    for (label, block) in region.blocks.iter().enumerate() {
        write_block(f, block, classes, depth, label)?;
    }
    write_indent(f, depth)?;
    write!(f, "}}")
}

impl ObInstr {
    /// Build a formatting helper that renders the instruction, resolving
    /// class keys to names through `classes` when available.
    pub fn fmt<'a>(&'a self, classes: Option<&'a dyn ClassNames>) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            instr: &'a ObInstr,
            classes: Option<&'a dyn ClassNames>,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write_instr(f, self.instr, self.classes, 0)
            }
        }

        Fmt {
            instr: self,
            classes,
        }
    }
}

impl ObFunction {
    /// Build a formatting helper that renders the whole function.
    pub fn fmt<'a>(&'a self, classes: Option<&'a dyn ClassNames>) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            function: &'a ObFunction,
            classes: Option<&'a dyn ClassNames>,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "func {}(", self.function.name)?;
                for (i, (name, ty)) in self.function.params.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "%{}: {}", name, ty)?;
                }
                write!(f, ")")?;
                if !self.function.return_types.is_empty() {
                    write!(f, " -> ")?;
                    write_ty_list(f, &self.function.return_types)?;
                }
                writeln!(f, " {{")?;
                for instr in &self.function.body.instructions {
                    write_instr(f, instr, self.classes, 1)?;
                    writeln!(f)?;
                }
                write_terminator(f, &self.function.body.terminator, 1)?;
                writeln!(f)?;
                write!(f, "}}")
            }
        }

        Fmt {
            function: self,
            classes,
        }
    }
}

impl ObModule {
    /// Build a formatting helper that renders the initializer sequence
    /// followed by every function.
    pub fn fmt<'a>(&'a self, classes: Option<&'a dyn ClassNames>) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            module: &'a ObModule,
            classes: Option<&'a dyn ClassNames>,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                for instr in &self.module.init {
                    write_instr(f, instr, self.classes, 0)?;
                    writeln!(f)?;
                }
                for function in &self.module.functions {
                    writeln!(f, "{}", function.fmt(self.classes))?;
                }
                Ok(())
            }
        }

        Fmt {
            module: self,
            classes,
        }
    }
}
