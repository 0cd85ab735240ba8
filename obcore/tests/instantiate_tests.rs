use obcore::{
    ObError,
    annotate::ClassAnnotator,
    class::{Arenas, AttributeDescr, ClassDescr, MethodDescr, ObjectInstance, SlotValue},
    graph::{SourceBlock, SourceGraph, SourceInstr, SourceTerminator, SourceValue},
    instantiate::ModuleInstantiator,
};
use obinstr::{
    instr::ObInstr,
    operand::Operand,
    types::{ClassKey, DynType},
};

fn getter_graph(class: ClassKey, attr: &str, attr_ty: DynType) -> SourceGraph {
    SourceGraph {
        entry: SourceBlock {
            params: vec![(SourceValue(0), DynType::Class(class))],
            instructions: vec![SourceInstr::GetAttr {
                dest: SourceValue(1),
                object: SourceValue(0),
                name: attr.to_string(),
            }],
            terminator: SourceTerminator::Return {
                values: vec![SourceValue(1)],
            },
        },
        return_tys: vec![attr_ty],
    }
}

/// `Main { s1: Inner, s2: Inner, x: int }` where both submodule slots hold
/// the identical `Inner` instance.
fn shared_submodule_fixture(arenas: &mut Arenas) -> (ClassKey, obcore::class::ObjectKey) {
    let inner_class = arenas.classes.insert_with_key(|key| ClassDescr {
        name: "Inner".to_string(),
        attributes: vec![AttributeDescr {
            name: "n".to_string(),
            ty: DynType::Int,
        }],
        methods: vec![MethodDescr {
            name: "get".to_string(),
            graph: getter_graph(key, "n", DynType::Int),
        }],
    });
    let main_class = arenas.classes.insert_with_key(|key| ClassDescr {
        name: "Main".to_string(),
        attributes: vec![
            AttributeDescr {
                name: "s1".to_string(),
                ty: DynType::Class(inner_class),
            },
            AttributeDescr {
                name: "s2".to_string(),
                ty: DynType::Class(inner_class),
            },
            AttributeDescr {
                name: "x".to_string(),
                ty: DynType::Int,
            },
        ],
        methods: vec![MethodDescr {
            name: "forward".to_string(),
            graph: getter_graph(key, "x", DynType::Int),
        }],
    });

    let inner = arenas.add_object(ObjectInstance {
        class: inner_class,
        slots: vec![SlotValue::Int(3)],
    });
    let main = arenas.add_object(ObjectInstance {
        class: main_class,
        slots: vec![
            SlotValue::Object(inner),
            SlotValue::Object(inner),
            SlotValue::Int(7),
        ],
    });
    (main_class, main)
}

fn construct_instrs(init: &[ObInstr]) -> Vec<&obinstr::instr::Construct> {
    init.iter()
        .filter_map(|instr| match instr {
            ObInstr::Construct(construct) => Some(construct),
            _ => None,
        })
        .collect()
}

#[test]
fn shared_submodules_are_constructed_exactly_once() {
    let mut arenas = Arenas::new();
    let (_, main) = shared_submodule_fixture(&mut arenas);

    let mut init = Vec::new();
    ModuleInstantiator::new(&arenas)
        .instantiate(main, &mut init)
        .expect("instantiation should succeed");

    let constructs = construct_instrs(&init);
    assert_eq!(constructs.len(), 2, "one inner, one main; no duplicates");

    // Children come first.
    assert_eq!(arenas.class(constructs[0].class).unwrap().name, "Inner");
    assert_eq!(arenas.class(constructs[1].class).unwrap().name, "Main");

    // Both submodule slots of the parent reuse the inner construction.
    let slots = constructs[1].slots.entry().expect("slot block");
    let slot_values: Vec<_> = slots
        .instructions
        .iter()
        .filter_map(|instr| match instr {
            ObInstr::SlotInit(slot) => Some((slot.name.as_str(), slot.value.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(slot_values.len(), 3);
    assert_eq!(slot_values[0].0, "s1");
    assert_eq!(slot_values[1].0, "s2");
    assert_eq!(slot_values[2].0, "x");
    assert_eq!(
        slot_values[0].1, slot_values[1].1,
        "shared submodule identity must survive as one value"
    );
    assert_eq!(
        slot_values[0].1,
        Operand::Reg(constructs[0].dest),
        "submodule slots reference the child construction result"
    );
}

#[test]
fn slot_count_disagreement_is_a_mismatch() {
    let mut arenas = Arenas::new();
    let inner_class = arenas.add_class(ClassDescr {
        name: "Inner".to_string(),
        attributes: vec![
            AttributeDescr {
                name: "a".to_string(),
                ty: DynType::Int,
            },
            AttributeDescr {
                name: "b".to_string(),
                ty: DynType::Int,
            },
        ],
        methods: vec![],
    });
    let short = arenas.add_object(ObjectInstance {
        class: inner_class,
        slots: vec![SlotValue::Int(1)],
    });

    let mut init = Vec::new();
    let err = ModuleInstantiator::new(&arenas)
        .instantiate(short, &mut init)
        .unwrap_err();
    let ObError::SlotMismatch { class, detail } = err else {
        panic!("expected SlotMismatch, got {err:?}");
    };
    assert_eq!(class, "Inner");
    assert!(detail.contains("expected 2"), "unexpected detail: {detail}");
}

#[test]
fn misordered_slot_values_are_a_mismatch() {
    let mut arenas = Arenas::new();
    let (_, main) = shared_submodule_fixture(&mut arenas);

    // Swap a submodule slot with the integer slot.
    let instance = &mut arenas.objects[main];
    instance.slots.swap(0, 2);

    let mut init = Vec::new();
    let err = ModuleInstantiator::new(&arenas)
        .instantiate(main, &mut init)
        .unwrap_err();
    let ObError::SlotMismatch { class, detail } = err else {
        panic!("expected SlotMismatch, got {err:?}");
    };
    assert_eq!(class, "Main");
    assert!(detail.contains("'s1'"), "unexpected detail: {detail}");
}

#[test]
fn aggregate_slots_lower_through_build_instructions() {
    let mut arenas = Arenas::new();
    let class = arenas.add_class(ClassDescr {
        name: "Config".to_string(),
        attributes: vec![
            AttributeDescr {
                name: "pair".to_string(),
                ty: DynType::Tuple(vec![DynType::Int, DynType::Str]),
            },
            AttributeDescr {
                name: "sizes".to_string(),
                ty: DynType::List(Box::new(DynType::Int)),
            },
            AttributeDescr {
                name: "label".to_string(),
                ty: DynType::Optional(Box::new(DynType::Str)),
            },
        ],
        methods: vec![],
    });
    let object = arenas.add_object(ObjectInstance {
        class,
        slots: vec![
            SlotValue::Tuple(vec![SlotValue::Int(1), SlotValue::Str("one".to_string())]),
            SlotValue::List(vec![SlotValue::Int(2), SlotValue::Int(4)]),
            SlotValue::None,
        ],
    });

    let mut init = Vec::new();
    ModuleInstantiator::new(&arenas)
        .instantiate(object, &mut init)
        .expect("aggregate slots should instantiate");

    assert!(init.iter().any(|instr| instr.is_build_tuple()));
    assert!(init.iter().any(|instr| instr.is_build_list()));
    let constructs = construct_instrs(&init);
    assert_eq!(constructs.len(), 1);
    // Aggregates are built before the construction that consumes them.
    assert!(matches!(init.last(), Some(ObInstr::Construct(_))));
}

#[test]
fn import_module_emits_each_class_method_once() {
    let mut arenas = Arenas::new();
    let (_, main) = shared_submodule_fixture(&mut arenas);

    let module = ModuleInstantiator::new(&arenas)
        .import_module(main)
        .expect("module import should succeed");

    let mut names: Vec<_> = module
        .functions
        .iter()
        .map(|function| function.name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Inner.get", "Main.forward"]);
    for function in &module.functions {
        function.check_ssa().expect("imported function must verify");
    }
}

#[test]
fn pruned_import_keeps_only_exported_methods() {
    let mut arenas = Arenas::new();
    let (main_class, main) = shared_submodule_fixture(&mut arenas);

    let mut annotator = ClassAnnotator::new();
    annotator.export_none(main_class, &arenas).unwrap();
    annotator
        .export_path(&["forward"], main_class, &arenas)
        .unwrap();

    let module = ModuleInstantiator::new(&arenas)
        .import_module_pruned(main, &annotator)
        .expect("pruned import should succeed");

    let names: Vec<_> = module
        .functions
        .iter()
        .map(|function| function.name.as_str())
        .collect();
    assert_eq!(names, vec!["Main.forward"]);
    // Construction is unaffected by export state.
    assert_eq!(construct_instrs(&module.init).len(), 2);
}

#[test]
fn cyclic_object_graphs_are_rejected() {
    let mut arenas = Arenas::new();
    let (class_a, class_b) = {
        let a = arenas.classes.insert_with_key(|_| ClassDescr {
            name: "A".to_string(),
            attributes: vec![],
            methods: vec![],
        });
        let b = arenas.add_class(ClassDescr {
            name: "B".to_string(),
            attributes: vec![AttributeDescr {
                name: "a".to_string(),
                ty: DynType::Class(a),
            }],
            methods: vec![],
        });
        arenas.classes[a].attributes.push(AttributeDescr {
            name: "b".to_string(),
            ty: DynType::Class(b),
        });
        (a, b)
    };

    let object_a = arenas.add_object(ObjectInstance {
        class: class_a,
        slots: vec![],
    });
    let object_b = arenas.add_object(ObjectInstance {
        class: class_b,
        slots: vec![SlotValue::Object(object_a)],
    });
    arenas.objects[object_a].slots = vec![SlotValue::Object(object_b)];

    let mut init = Vec::new();
    let err = ModuleInstantiator::new(&arenas)
        .instantiate(object_a, &mut init)
        .unwrap_err();
    let ObError::SlotMismatch { detail, .. } = err else {
        panic!("expected SlotMismatch, got {err:?}");
    };
    assert!(detail.contains("cyclic"), "unexpected detail: {detail}");
}

#[test]
fn module_rendering_includes_init_and_functions() {
    let mut arenas = Arenas::new();
    let (_, main) = shared_submodule_fixture(&mut arenas);

    let module = ModuleInstantiator::new(&arenas).import_module(main).unwrap();
    let rendered = format!("{}", module.fmt(Some(&arenas)));

    assert!(rendered.contains("construct @Inner"), "got:\n{rendered}");
    assert!(rendered.contains("construct @Main"), "got:\n{rendered}");
    assert!(rendered.contains("slot \"s1\""), "got:\n{rendered}");
    assert!(rendered.contains("func Main.forward"), "got:\n{rendered}");
}
