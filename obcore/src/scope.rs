//! Value/scope mapping during import.
//!
//! Maps source-graph value identities to destination SSA names. Scopes nest
//! lexically: entering a region pushes a frame, leaving pops it, and lookups
//! fall through to enclosing frames but never across siblings. The stack is
//! owned exclusively by one in-flight import.
use std::collections::BTreeMap;

use obinstr::operand::Name;

use crate::{
    error::{ObError, ObResult},
    graph::SourceValue,
};

#[derive(Debug, Default)]
pub struct ValueScope {
    frames: Vec<BTreeMap<SourceValue, Name>>,
}

impl ValueScope {
    /// A scope with a single root frame.
    pub fn new() -> Self {
        ValueScope {
            frames: vec![BTreeMap::new()],
        }
    }

    /// Enter a nested region.
    pub fn push(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    /// Leave the innermost region, discarding its bindings.
    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "popped the root scope frame");
        self.frames.pop();
    }

    /// Bind a source value to a destination name in the innermost frame.
    /// A source graph in SSA form never defines a value twice.
    pub fn bind(&mut self, value: SourceValue, name: Name) {
        let frame = self.frames.last_mut().expect("scope has no frames");
        let previous = frame.insert(value, name);
        debug_assert!(
            previous.is_none(),
            "source value {} bound twice in one scope",
            value
        );
    }

    /// Resolve a source value, falling through enclosing frames.
    pub fn resolve(&self, value: SourceValue) -> ObResult<Name> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&value).copied())
            .ok_or(ObError::UnresolvedOperand { value })
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_through_to_enclosing_frames() {
        let mut scope = ValueScope::new();
        scope.bind(SourceValue(0), Name(10));
        scope.push();
        scope.bind(SourceValue(1), Name(11));

        assert_eq!(scope.resolve(SourceValue(0)).unwrap(), Name(10));
        assert_eq!(scope.resolve(SourceValue(1)).unwrap(), Name(11));
    }

    #[test]
    fn inner_bindings_do_not_leak_out() {
        let mut scope = ValueScope::new();
        scope.push();
        scope.bind(SourceValue(5), Name(1));
        scope.pop();

        assert!(matches!(
            scope.resolve(SourceValue(5)),
            Err(ObError::UnresolvedOperand {
                value: SourceValue(5)
            })
        ));
    }

    #[test]
    fn inner_frame_shadows_outer_binding() {
        let mut scope = ValueScope::new();
        scope.bind(SourceValue(3), Name(1));
        scope.push();
        scope.bind(SourceValue(3), Name(2));

        assert_eq!(scope.resolve(SourceValue(3)).unwrap(), Name(2));
        scope.pop();
        assert_eq!(scope.resolve(SourceValue(3)).unwrap(), Name(1));
    }
}
