use obcore::{
    ObError,
    annotate::ClassAnnotator,
    class::{Arenas, AttributeDescr, ClassDescr, MethodDescr},
    graph::{SourceBlock, SourceGraph, SourceInstr, SourceTerminator, SourceValue},
};
use obinstr::types::{ClassKey, DynType};

/// Method body that loads one attribute of the receiver and returns it.
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

/// `Main { s1: Inner, s2: Inner, x: int; forward() }` with
/// `Inner { n: int; get() }`. Both submodule attributes share one class.
fn submodule_hierarchy(arenas: &mut Arenas) -> (ClassKey, ClassKey) {
    let inner = arenas.classes.insert_with_key(|key| ClassDescr {
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
    let main = arenas.classes.insert_with_key(|key| ClassDescr {
        name: "Main".to_string(),
        attributes: vec![
            AttributeDescr {
                name: "s1".to_string(),
                ty: DynType::Class(inner),
            },
            AttributeDescr {
                name: "s2".to_string(),
                ty: DynType::Class(inner),
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
    (main, inner)
}

#[test]
fn export_none_covers_the_whole_hierarchy() {
    let mut arenas = Arenas::new();
    let (main, inner) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    annotator
        .export_none(main, &arenas)
        .expect("export_none should succeed on a well-formed hierarchy");

    for class in [main, inner] {
        let descr = arenas.class(class).unwrap();
        let annotation = annotator
            .get(class)
            .expect("export_none should create a record for every reachable class");
        for attribute in annotation.attribute_annotations(descr).unwrap() {
            assert!(!attribute.exported);
        }
        for method in annotation.method_annotations(descr).unwrap() {
            assert!(!method.exported);
        }
    }
}

#[test]
fn export_path_marks_a_direct_method() {
    let mut arenas = Arenas::new();
    let (main, _) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    annotator
        .export_path(&["forward"], main, &arenas)
        .expect("direct method path should resolve");

    assert!(annotator.is_method_exported(main, 0, &arenas).unwrap());
    let descr = arenas.class(main).unwrap();
    let annotation = annotator.get(main).unwrap();
    for attribute in annotation.attribute_annotations(descr).unwrap() {
        assert!(!attribute.exported, "unrelated attributes must keep their flags");
    }
}

#[test]
fn export_path_walks_through_submodules() {
    let mut arenas = Arenas::new();
    let (main, inner) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    annotator
        .export_path(&["s1", "get"], main, &arenas)
        .expect("path through a class-typed attribute should resolve");

    assert!(annotator.is_method_exported(inner, 0, &arenas).unwrap());
    // The intermediate class never gets a record of its own from the walk.
    assert!(annotator.get(main).is_none());
}

#[test]
fn export_path_is_idempotent() {
    let mut arenas = Arenas::new();
    let (main, inner) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    annotator.export_path(&["s2", "get"], main, &arenas).unwrap();
    annotator.export_path(&["s2", "get"], main, &arenas).unwrap();

    assert!(annotator.is_method_exported(inner, 0, &arenas).unwrap());
}

#[test]
fn empty_path_is_rejected() {
    let mut arenas = Arenas::new();
    let (main, _) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    let err = annotator.export_path(&[], main, &arenas).unwrap_err();
    assert!(matches!(err, ObError::InvalidPath { .. }));
}

#[test]
fn non_submodule_intermediate_is_rejected() {
    let mut arenas = Arenas::new();
    let (main, _) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    let err = annotator
        .export_path(&["x", "get"], main, &arenas)
        .unwrap_err();
    let ObError::InvalidPath { detail } = err else {
        panic!("expected InvalidPath, got {err:?}");
    };
    assert!(
        detail.contains("does not have a submodule in attribute 'x'"),
        "unexpected detail: {detail}"
    );
}

#[test]
fn failed_export_leaves_the_overlay_untouched() {
    let mut arenas = Arenas::new();
    let (main, inner) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();

    let err = annotator
        .export_path(&["s1", "missing"], main, &arenas)
        .unwrap_err();
    assert!(matches!(err, ObError::InvalidPath { .. }));
    assert!(annotator.get(inner).is_none());
    assert!(annotator.get(main).is_none());
}

#[test]
fn shared_name_marks_both_attribute_and_method() {
    let mut arenas = Arenas::new();
    let weight = arenas.classes.insert_with_key(|key| ClassDescr {
        name: "Weight".to_string(),
        attributes: vec![AttributeDescr {
            name: "value".to_string(),
            ty: DynType::Float,
        }],
        methods: vec![MethodDescr {
            name: "value".to_string(),
            graph: getter_graph(key, "value", DynType::Float),
        }],
    });
    let mut annotator = ClassAnnotator::new();

    annotator.export_path(&["value"], weight, &arenas).unwrap();

    let descr = arenas.class(weight).unwrap();
    let annotation = annotator.get(weight).unwrap();
    assert!(annotation.attribute_annotations(descr).unwrap()[0].exported);
    assert!(annotation.method_annotations(descr).unwrap()[0].exported);
}

#[test]
fn structural_mutation_after_annotation_is_detected() {
    let mut arenas = Arenas::new();
    let (main, _) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();
    annotator.get_or_create(main, &arenas).unwrap();

    // Caller misuse: growing the class after its annotation was sized.
    arenas.classes[main].attributes.push(AttributeDescr {
        name: "late".to_string(),
        ty: DynType::Bool,
    });

    let descr = arenas.class(main).unwrap();
    let err = annotator
        .get(main)
        .unwrap()
        .attribute_annotations(descr)
        .unwrap_err();
    assert!(matches!(
        err,
        ObError::AnnotationOutOfSync {
            annotated: 3,
            live: 4,
            ..
        }
    ));
}

#[test]
fn render_lists_classes_in_creation_order() {
    let mut arenas = Arenas::new();
    let (main, _) = submodule_hierarchy(&mut arenas);
    let mut annotator = ClassAnnotator::new();
    annotator.export_path(&["forward"], main, &arenas).unwrap();

    let rendered = annotator.render(&arenas).unwrap();
    let expected = "\
ClassAnnotator {
  ClassAnnotation('Main') {
    AttributeAnnotation('s1') { exported = false }
    AttributeAnnotation('s2') { exported = false }
    AttributeAnnotation('x') { exported = false }
    MethodAnnotation('forward') { exported = true }
  }
}
";
    assert_eq!(rendered, expected);
}
