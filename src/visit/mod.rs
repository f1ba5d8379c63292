//! Traversal of the snapshot graph.
//!
//! [`Instance::accept`] never recurses: it hands each neighbour to
//! [`Visitor::visit_later`], and the visitor keeps its own work list. The
//! [`walk`] loop drains that list, so the depth of the heap graph never
//! turns into call stack depth.
//!
//! Duplicate suppression is per [`Epoch`]. A visitor pushes an instance only
//! if it wins the mark for the current epoch, so every instance is visited
//! at most once per traversal however many referrers it has.

use std::collections::VecDeque;

use crate::error::HeapError;
use crate::snapshot::{ArrayInstance, ClassInstance, ClassObj, Id, Instance, RootObj, Snapshot};

mod par_reachability;
mod reachability;

pub use par_reachability::par_reachable;
pub use reachability::{reachable, reachable_from, HeapTally, Reachability, ReachabilityVisitor};

/// Identifies one traversal. Obtained from [`Snapshot::new_epoch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch(u32);

impl Epoch {
    pub(crate) fn new(raw: u32) -> Self {
        Epoch(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Consumer side of a traversal.
///
/// The `visit_*` callbacks fire from [`Instance::accept`] for the instance
/// being visited. `visit_later` receives each of its neighbours and should
/// queue them, typically through a [`WorkList`]; `next_pending` feeds them
/// back to [`walk`].
pub trait Visitor<'s> {
    fn visit_root(&mut self, _root: &'s RootObj) {}
    fn visit_class_obj(&mut self, _instance: &'s Instance, _class: &'s ClassObj) {}
    fn visit_class_instance(&mut self, _instance: &'s Instance, _object: &'s ClassInstance) {}
    fn visit_array_instance(&mut self, _instance: &'s Instance, _array: &'s ArrayInstance) {}
    fn visit_later(&mut self, instance: &'s Instance);
    fn next_pending(&mut self) -> Option<&'s Instance>;
}

/// FIFO of instances waiting for `accept`, deduplicated by epoch mark.
#[derive(Debug)]
pub struct WorkList<'s> {
    epoch: Epoch,
    pending: VecDeque<&'s Instance>,
    enqueued: u64,
}

impl<'s> WorkList<'s> {
    pub fn new(epoch: Epoch) -> Self {
        WorkList {
            epoch,
            pending: VecDeque::new(),
            enqueued: 0,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Queues `instance` unless it was already marked in this epoch.
    pub fn push(&mut self, instance: &'s Instance) -> bool {
        if instance.mark(self.epoch) {
            self.enqueued += 1;
            self.pending.push_back(instance);
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<&'s Instance> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total instances ever queued.
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }
}

#[derive(Debug, Default)]
pub struct WalkStats {
    /// Instances `accept` was called on.
    pub visited: u64,
    /// Instances whose references could not be decoded, with the reason.
    /// Their neighbours were not followed.
    pub malformed: Vec<(Id, HeapError)>,
}

impl WalkStats {
    pub fn merge(&mut self, other: WalkStats) {
        self.visited += other.visited;
        self.malformed.extend(other.malformed);
    }
}

/// Offers every resolvable root to `visitor`.
pub fn seed_roots<'s, V: Visitor<'s> + ?Sized>(snapshot: &'s Snapshot, visitor: &mut V) {
    for root in snapshot.roots() {
        visitor.visit_root(root);
        if let Some(instance) = root.referent(snapshot) {
            visitor.visit_later(instance);
        }
    }
}

/// Drains the visitor's pending instances, accepting each one, until none
/// remain.
///
/// An instance whose references fail to decode is recorded in the returned
/// stats and the walk carries on with the next one.
pub fn walk<'s, V: Visitor<'s> + ?Sized>(snapshot: &'s Snapshot, visitor: &mut V) -> WalkStats {
    let mut stats = WalkStats::default();
    while let Some(instance) = visitor.next_pending() {
        stats.visited += 1;
        if let Err(e) = instance.accept(snapshot, visitor) {
            warn!("Skipping references of 0x{:x}: {}", instance.id(), e);
            stats.malformed.push((instance.id(), e));
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferWriter, IdSize, Type, Value};
    use crate::field::Field;
    use crate::snapshot::{HeapId, RootType, SnapshotBuilder};
    use std::collections::HashSet;

    /// Records every callback and every offered neighbour.
    struct Recorder<'s> {
        work: WorkList<'s>,
        class_visits: Vec<Id>,
        offered: Vec<Id>,
    }

    impl<'s> Recorder<'s> {
        fn new(epoch: Epoch) -> Self {
            Recorder {
                work: WorkList::new(epoch),
                class_visits: vec![],
                offered: vec![],
            }
        }
    }

    impl<'s> Visitor<'s> for Recorder<'s> {
        fn visit_class_obj(&mut self, instance: &'s Instance, _class: &'s ClassObj) {
            self.class_visits.push(instance.id());
        }

        fn visit_later(&mut self, instance: &'s Instance) {
            self.offered.push(instance.id());
            self.work.push(instance);
        }

        fn next_pending(&mut self) -> Option<&'s Instance> {
            self.work.pop()
        }
    }

    const HEAP: HeapId = 0;

    /// Two classes whose statics both point at `shared` (0x100). `shared`
    /// and `other` (0x200) point at each other.
    fn shared_static_snapshot() -> Snapshot {
        let mut w = BufferWriter::new(IdSize::LONG);
        let statics_a = w.write_static_block(&[
            (0x1000, Value::Object(0x100)),
            (0x1001, Value::Int(3)),
            (0x1002, Value::Object(0xdead)),
        ]);
        let statics_b = w.write_static_block(&[(0x1000, Value::Object(0x100))]);
        let empty = w.write_static_block(&[]);
        let shared = w.write_values(&[Value::Object(0x200)]);
        let other = w.write_values(&[Value::Object(0x100)]);

        let mut a = ClassObj::new(0x1, "A", statics_a);
        a.set_static_fields(vec![
            Field::new(Type::Object, "SHARED"),
            Field::new(Type::Int, "COUNT"),
            Field::new(Type::Object, "GONE"),
        ]);
        let mut b = ClassObj::new(0x2, "B", statics_b);
        b.set_static_fields(vec![Field::new(Type::Object, "SHARED")]);
        let mut node = ClassObj::new(0x3, "Node", empty);
        node.set_fields(vec![Field::new(Type::Object, "peer")]);

        let mut builder = SnapshotBuilder::new(w.finish());
        builder.add_heap(HEAP, "default").unwrap();
        builder.add_class(HEAP, a, 0).unwrap();
        builder.add_class(HEAP, b, 0).unwrap();
        builder.add_class(HEAP, node, 0).unwrap();
        builder
            .add_instance(HEAP, Instance::object(0x100, 0x3, shared).with_size(16))
            .unwrap();
        builder
            .add_instance(HEAP, Instance::object(0x200, 0x3, other).with_size(16))
            .unwrap();
        builder.add_root(RootObj::new(RootType::SystemClass, 0x1, HEAP));
        builder.add_root(RootObj::new(RootType::SystemClass, 0x2, HEAP));
        builder.build()
    }

    #[test]
    fn test_accept_registers_referrers_once() {
        let snapshot = shared_static_snapshot();
        let a = snapshot.find_reference(0x1).unwrap();
        let shared = snapshot.find_reference(0x100).unwrap();

        let mut first = Recorder::new(snapshot.new_epoch());
        a.accept(&snapshot, &mut first).unwrap();
        assert!(a.references_added());
        assert_eq!(first.class_visits, vec![0x1]);
        // The int static is skipped, the dangling reference too
        assert_eq!(first.offered, vec![0x100]);
        assert_eq!(shared.referrers(), vec![0x1]);

        let mut second = Recorder::new(snapshot.new_epoch());
        a.accept(&snapshot, &mut second).unwrap();
        a.accept(&snapshot, &mut second).unwrap();
        let once: HashSet<Id> = first.offered.iter().copied().collect();
        let twice: HashSet<Id> = second.offered.iter().copied().collect();
        assert_eq!(once, twice);
        assert_eq!(second.work.enqueued(), 1);
        assert_eq!(shared.referrers(), vec![0x1]);
    }

    #[test]
    fn test_shared_neighbour_enqueued_once() {
        let snapshot = shared_static_snapshot();
        let mut visitor = Recorder::new(snapshot.new_epoch());
        seed_roots(&snapshot, &mut visitor);
        let stats = walk(&snapshot, &mut visitor);
        assert!(stats.malformed.is_empty());
        // A, B, shared and other; the cycle between shared and other ends
        assert_eq!(stats.visited, 4);
        assert_eq!(visitor.work.enqueued(), 4);
        assert_eq!(visitor.class_visits, vec![0x1, 0x2]);
        // Offered three times (A, B, other), queued once
        assert_eq!(visitor.offered.iter().filter(|id| **id == 0x100).count(), 3);
        let shared = snapshot.find_reference(0x100).unwrap();
        assert_eq!(shared.referrers(), vec![0x1, 0x2, 0x200]);
    }

    #[test]
    fn test_fresh_epoch_after_abandoned_walk() {
        let snapshot = shared_static_snapshot();
        let mut abandoned = Recorder::new(snapshot.new_epoch());
        seed_roots(&snapshot, &mut abandoned);
        // Stop after a single step
        let a = abandoned.next_pending().unwrap();
        a.accept(&snapshot, &mut abandoned).unwrap();

        let mut fresh = Recorder::new(snapshot.new_epoch());
        seed_roots(&snapshot, &mut fresh);
        let stats = walk(&snapshot, &mut fresh);
        assert_eq!(stats.visited, 4);
    }

    #[test]
    fn test_walk_skips_malformed() {
        let mut w = BufferWriter::new(IdSize::LONG);
        let ok = w.write_static_block(&[(0x9, Value::Object(0x3))]);
        let mut good = ClassObj::new(0x1, "Good", ok);
        good.set_static_fields(vec![Field::new(Type::Object, "NEXT")]);
        // Points past the end of the buffer
        let bad = ClassObj::new(0x3, "Bad", 4096);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP, "default").unwrap();
        b.add_class(HEAP, good, 0).unwrap();
        b.add_class(HEAP, bad, 0).unwrap();
        b.add_root(RootObj::new(RootType::SystemClass, 0x1, HEAP));
        let snapshot = b.build();

        let mut visitor = Recorder::new(snapshot.new_epoch());
        seed_roots(&snapshot, &mut visitor);
        let stats = walk(&snapshot, &mut visitor);
        assert_eq!(stats.visited, 2);
        assert_eq!(stats.malformed.len(), 1);
        assert_eq!(stats.malformed[0].0, 0x3);
        assert!(stats.malformed[0].1.is_malformed_dump());
        assert!(!snapshot.find_reference(0x3).unwrap().references_added());
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        const LENGTH: u64 = 200_000;
        let mut w = BufferWriter::new(IdSize::LONG);
        let empty = w.write_static_block(&[]);
        let mut node = ClassObj::new(0x1, "Node", empty);
        node.set_fields(vec![Field::new(Type::Object, "next")]);
        let mut offsets = vec![];
        for i in 0..LENGTH {
            let next = if i + 1 == LENGTH { 0 } else { 0x100 + i + 1 };
            offsets.push(w.write_values(&[Value::Object(next)]));
        }
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP, "default").unwrap();
        b.add_class(HEAP, node, 0).unwrap();
        for (i, offset) in offsets.into_iter().enumerate() {
            b.add_instance(HEAP, Instance::object(0x100 + i as u64, 0x1, offset))
                .unwrap();
        }
        b.add_root(RootObj::new(RootType::JavaLocal, 0x100, HEAP));
        let snapshot = b.build();

        let mut visitor = Recorder::new(snapshot.new_epoch());
        seed_roots(&snapshot, &mut visitor);
        let stats = walk(&snapshot, &mut visitor);
        assert_eq!(stats.visited, LENGTH);
    }
}
