//! Ordered, owning collection of view parts.
//!
//! Render order is append order and that ordering is significant: later
//! parts may overlay cells established by earlier ones (the selection
//! overlay registers after the text part for exactly this reason).
//!
//! Invariants:
//! * Iteration order equals registration order, deterministically, for
//!   repeated queries with the same dirty set.
//! * `PartId` values are allocated densely from zero and stay valid for the
//!   registry's lifetime (parts are never removed individually; the whole
//!   registry is torn down with its view).
//! * Double registration of one part is unrepresentable: `register` takes
//!   the part by value, so a caller cannot hand the same instance in twice.

use crate::ViewPart;

/// Stable identifier for a registered part (dense index allocation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartId(pub usize);

#[derive(Default)]
pub struct PartRegistry {
    parts: Vec<Box<dyn ViewPart>>,
}

impl PartRegistry {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Append a part; its render position is fixed at this point.
    pub fn register(&mut self, part: Box<dyn ViewPart>) -> PartId {
        let id = PartId(self.parts.len());
        tracing::trace!(target: "view.registry", part = part.name(), index = id.0, "part_registered");
        self.parts.push(part);
        id
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, id: PartId) -> Option<&dyn ViewPart> {
        self.parts.get(id.0).map(|p| p.as_ref())
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Box<dyn ViewPart>> {
        self.parts.get_mut(id.0)
    }

    /// Indices of parts currently reporting stale state, in registration
    /// order.
    pub fn dirty_indices(&self) -> Vec<usize> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.needs_render())
            .map(|(i, _)| i)
            .collect()
    }

    /// Mark every part dirty (resize and other full-relayout events).
    pub fn force_all(&mut self) {
        for part in &mut self.parts {
            part.force_should_render();
        }
    }

    /// Mutable access for the render pass: the slice preserves registration
    /// order.
    pub fn parts_for_pass(&mut self) -> &mut [Box<dyn ViewPart>] {
        &mut self.parts
    }
}

impl std::fmt::Debug for PartRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartRegistry")
            .field("len", &self.parts.len())
            .field(
                "parts",
                &self.parts.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DirtyFlag, PartLayout, PartSurface, ViewPart, ViewportSnapshot};
    use anyhow::Result;

    struct StubPart {
        name: &'static str,
        dirty: DirtyFlag,
    }

    impl StubPart {
        fn new(name: &'static str, dirty: bool) -> Self {
            let mut flag = DirtyFlag::new();
            if dirty {
                flag.mark();
            }
            Self { name, dirty: flag }
        }
    }

    impl ViewPart for StubPart {
        fn name(&self) -> &'static str {
            self.name
        }
        fn needs_render(&self) -> bool {
            self.dirty.is_set()
        }
        fn force_should_render(&mut self) {
            self.dirty.force();
        }
        fn prepare(&mut self, _snapshot: &ViewportSnapshot) -> Result<PartLayout> {
            Ok(PartLayout::empty())
        }
        fn commit(&mut self, _layout: &PartLayout, _surface: &mut dyn PartSurface) -> Result<()> {
            self.dirty.clear();
            Ok(())
        }
    }

    #[test]
    fn ids_are_dense_and_ordered() {
        let mut reg = PartRegistry::new();
        let a = reg.register(Box::new(StubPart::new("a", false)));
        let b = reg.register(Box::new(StubPart::new("b", false)));
        assert_eq!(a, PartId(0));
        assert_eq!(b, PartId(1));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.part(a).unwrap().name(), "a");
    }

    #[test]
    fn dirty_indices_follow_registration_order() {
        let mut reg = PartRegistry::new();
        reg.register(Box::new(StubPart::new("a", true)));
        reg.register(Box::new(StubPart::new("b", false)));
        reg.register(Box::new(StubPart::new("c", true)));
        assert_eq!(reg.dirty_indices(), vec![0, 2]);
        // Same dirty set, same answer.
        assert_eq!(reg.dirty_indices(), vec![0, 2]);
    }

    #[test]
    fn force_all_marks_every_part() {
        let mut reg = PartRegistry::new();
        reg.register(Box::new(StubPart::new("a", false)));
        reg.register(Box::new(StubPart::new("b", false)));
        assert!(reg.dirty_indices().is_empty());
        reg.force_all();
        assert_eq!(reg.dirty_indices(), vec![0, 1]);
    }
}
