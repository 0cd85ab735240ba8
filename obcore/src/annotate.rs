//! The per-class export annotation overlay.
//!
//! A side-table keyed by class identity recording, for each attribute and
//! method, whether it belongs to the externally visible surface, plus
//! optional static-type refinements. The overlay is independent of the IR
//! translation and is consumed downstream to prune the instantiated or
//! imported surface.
//!
//! Annotations are valid only for the lifetime of an immutable snapshot of
//! the class description: the stored collection lengths must equal the live
//! attribute/method counts, and this is checked on every access. A mismatch
//! is caller misuse ([`ObError::AnnotationOutOfSync`]); the overlay never
//! resynchronizes, because a general mapping from old to new member
//! identity is not recoverable.
use std::collections::BTreeSet;
use std::fmt::Write as _;

use log::debug;
use obinstr::types::{ClassKey, DynType};
use slotmap::SecondaryMap;

use crate::{
    class::{Arenas, ClassDescr},
    error::{ObError, ObResult},
};

/// Export state of one attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeAnnotation {
    pub exported: bool,
    /// Optional refinement of the declared type, narrower than or equal to
    /// it.
    pub refined_type: Option<DynType>,
}

/// Export state of one method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodAnnotation {
    pub exported: bool,
    /// Optional per-argument refinements, one entry per method parameter.
    pub arg_refinements: Vec<Option<DynType>>,
}

/// Annotation record for exactly one class.
///
/// Annotations are keyed by member *position*. If a class's members are
/// reordered (not resized) after annotation, stale annotations silently
/// attach to the wrong member; the checked invariant below only covers
/// counts.
#[derive(Debug, Clone)]
pub struct ClassAnnotation {
    class: ClassKey,
    attributes: Vec<AttributeAnnotation>,
    methods: Vec<MethodAnnotation>,
}

impl ClassAnnotation {
    fn new(class: ClassKey, descr: &ClassDescr) -> Self {
        ClassAnnotation {
            class,
            attributes: vec![AttributeAnnotation::default(); descr.attributes.len()],
            methods: descr
                .methods
                .iter()
                .map(|method| MethodAnnotation {
                    exported: false,
                    arg_refinements: vec![None; method.graph.entry.params.len()],
                })
                .collect(),
        }
    }

    pub fn class(&self) -> ClassKey {
        self.class
    }

    fn check_attributes(&self, descr: &ClassDescr) -> ObResult<()> {
        if self.attributes.len() != descr.attributes.len() {
            return Err(ObError::AnnotationOutOfSync {
                class: descr.name.clone(),
                member: "attribute",
                annotated: self.attributes.len(),
                live: descr.attributes.len(),
            });
        }
        Ok(())
    }

    fn check_methods(&self, descr: &ClassDescr) -> ObResult<()> {
        if self.methods.len() != descr.methods.len() {
            return Err(ObError::AnnotationOutOfSync {
                class: descr.name.clone(),
                member: "method",
                annotated: self.methods.len(),
                live: descr.methods.len(),
            });
        }
        Ok(())
    }

    /// Attribute annotations, in the class's declaration order.
    pub fn attribute_annotations(&self, descr: &ClassDescr) -> ObResult<&[AttributeAnnotation]> {
        self.check_attributes(descr)?;
        Ok(&self.attributes)
    }

    pub fn attribute_annotations_mut(
        &mut self,
        descr: &ClassDescr,
    ) -> ObResult<&mut [AttributeAnnotation]> {
        self.check_attributes(descr)?;
        Ok(&mut self.attributes)
    }

    /// Method annotations, in the class's declaration order.
    pub fn method_annotations(&self, descr: &ClassDescr) -> ObResult<&[MethodAnnotation]> {
        self.check_methods(descr)?;
        Ok(&self.methods)
    }

    pub fn method_annotations_mut(
        &mut self,
        descr: &ClassDescr,
    ) -> ObResult<&mut [MethodAnnotation]> {
        self.check_methods(descr)?;
        Ok(&mut self.methods)
    }
}

/// The annotation overlay: one [`ClassAnnotation`] per tracked class,
/// created on demand and never implicitly pruned.
///
/// One shared structure per translation unit. None of the mutating
/// operations are internally synchronized; multi-threaded callers need
/// external mutual exclusion.
#[derive(Debug, Default)]
pub struct ClassAnnotator {
    annotations: SecondaryMap<ClassKey, ClassAnnotation>,
    /// Creation order, for deterministic rendering.
    order: Vec<ClassKey>,
}

impl ClassAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the annotation record for `class`, creating it with every
    /// member defaulted to not-exported on first sight. The collections are
    /// sized from the class description observed now; mutating the class
    /// description afterwards is caller error.
    pub fn get_or_create(
        &mut self,
        class: ClassKey,
        arenas: &Arenas,
    ) -> ObResult<&mut ClassAnnotation> {
        let descr = arenas.class(class)?;
        if !self.annotations.contains_key(class) {
            debug!("creating annotation record for class '{}'", descr.name);
            self.annotations
                .insert(class, ClassAnnotation::new(class, descr));
            self.order.push(class);
        }
        Ok(&mut self.annotations[class])
    }

    pub fn get(&self, class: ClassKey) -> Option<&ClassAnnotation> {
        self.annotations.get(class)
    }

    /// Whether the method at `index` of `class` is exported. Classes the
    /// overlay has never seen default to not-exported.
    pub fn is_method_exported(
        &self,
        class: ClassKey,
        index: usize,
        arenas: &Arenas,
    ) -> ObResult<bool> {
        let Some(annotation) = self.annotations.get(class) else {
            return Ok(false);
        };
        let descr = arenas.class(class)?;
        let methods = annotation.method_annotations(descr)?;
        Ok(methods.get(index).is_some_and(|m| m.exported))
    }

    /// Recursively mark every attribute and method of `root`, and of every
    /// class reachable through class-typed attributes, as not exported.
    ///
    /// The operation is a pure overwrite, so revisiting a class reached
    /// along several paths would be idempotent; the visited set exists to
    /// guarantee termination on shared submodule graphs.
    pub fn export_none(&mut self, root: ClassKey, arenas: &Arenas) -> ObResult<()> {
        let mut visited = BTreeSet::new();
        self.export_none_recurse(root, arenas, &mut visited)
    }

    fn export_none_recurse(
        &mut self,
        class: ClassKey,
        arenas: &Arenas,
        visited: &mut BTreeSet<ClassKey>,
    ) -> ObResult<()> {
        if !visited.insert(class) {
            return Ok(());
        }
        let descr = arenas.class(class)?;
        let annotation = self.get_or_create(class, arenas)?;
        for attribute in annotation.attribute_annotations_mut(descr)? {
            attribute.exported = false;
        }
        for method in annotation.method_annotations_mut(descr)? {
            method.exported = false;
        }
        for attribute in &descr.attributes {
            if let DynType::Class(child) = attribute.ty {
                self.export_none_recurse(child, arenas, visited)?;
            }
        }
        Ok(())
    }

    /// Walk `path` from `root` through class-typed attributes and mark the
    /// member the final component names as exported.
    ///
    /// Every intermediate component must name a class-typed attribute; the
    /// final component must name an attribute or a method (a name shared by
    /// both marks both). Marking is additive: unrelated members keep their
    /// flags. Any failure is [`ObError::InvalidPath`] and leaves the overlay
    /// untouched.
    pub fn export_path(&mut self, path: &[&str], root: ClassKey, arenas: &Arenas) -> ObResult<()> {
        if path.is_empty() {
            return Err(ObError::InvalidPath {
                detail: "empty path; can only export a member of a class".to_string(),
            });
        }
        let mut class = root;
        for component in &path[..path.len() - 1] {
            let descr = arenas.class(class)?;
            let attribute =
                descr
                    .attribute(component)
                    .ok_or_else(|| ObError::InvalidPath {
                        detail: format!(
                            "class '{}' has no attribute '{}'",
                            descr.name, component
                        ),
                    })?;
            match &attribute.ty {
                DynType::Class(child) => class = *child,
                _ => {
                    return Err(ObError::InvalidPath {
                        detail: format!(
                            "class '{}' does not have a submodule in attribute '{}'",
                            descr.name, component
                        ),
                    });
                }
            }
        }

        let last = path[path.len() - 1];
        let descr = arenas.class(class)?;
        let attribute_index = descr.attribute_index(last);
        let method_index = descr.method_index(last);
        if attribute_index.is_none() && method_index.is_none() {
            return Err(ObError::InvalidPath {
                detail: format!(
                    "class '{}' has no attribute or method named '{}'",
                    descr.name, last
                ),
            });
        }

        // Path fully validated; only now touch the overlay.
        let annotation = self.get_or_create(class, arenas)?;
        if let Some(index) = attribute_index {
            annotation.attribute_annotations_mut(descr)?[index].exported = true;
        }
        if let Some(index) = method_index {
            annotation.method_annotations_mut(descr)?[index].exported = true;
        }
        debug!("exported '{}' on class '{}'", last, descr.name);
        Ok(())
    }

    /// Deterministic, human-readable dump of every tracked class's
    /// annotation state: classes in overlay insertion order, members in the
    /// class's declaration order.
    pub fn render(&self, arenas: &Arenas) -> ObResult<String> {
        let mut out = String::new();
        writeln!(out, "ClassAnnotator {{").expect("string write");
        for class in &self.order {
            let annotation = &self.annotations[*class];
            let descr = arenas.class(*class)?;
            writeln!(out, "  ClassAnnotation('{}') {{", descr.name).expect("string write");
            let attributes = annotation.attribute_annotations(descr)?;
            for (attribute, descr_attr) in attributes.iter().zip(descr.attributes.iter()) {
                writeln!(
                    out,
                    "    AttributeAnnotation('{}') {{ exported = {} }}",
                    descr_attr.name, attribute.exported
                )
                .expect("string write");
            }
            let methods = annotation.method_annotations(descr)?;
            for (method, descr_method) in methods.iter().zip(descr.methods.iter()) {
                writeln!(
                    out,
                    "    MethodAnnotation('{}') {{ exported = {} }}",
                    descr_method.name, method.exported
                )
                .expect("string write");
            }
            writeln!(out, "  }}").expect("string write");
        }
        writeln!(out, "}}").expect("string write");
        Ok(out)
    }
}
