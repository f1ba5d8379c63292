use std::collections::BTreeMap;

use super::{seed_roots, walk, Epoch, Visitor, WorkList};
use crate::error::HeapError;
use crate::snapshot::{ArrayInstance, ClassInstance, ClassObj, HeapId, Id, Instance, RootObj, Snapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapTally {
    pub objects: u64,
    pub shallow_size: u64,
}

/// What a reachability walk found.
#[derive(Debug, Default)]
pub struct Reachability {
    pub roots: u64,
    pub objects: u64,
    pub shallow_size: u64,
    pub per_heap: BTreeMap<HeapId, HeapTally>,
    pub malformed: Vec<(Id, HeapError)>,
}

impl Reachability {
    pub(super) fn record(&mut self, instance: &Instance) {
        self.objects += 1;
        self.shallow_size += instance.size();
        let tally = self.per_heap.entry(instance.heap_id()).or_default();
        tally.objects += 1;
        tally.shallow_size += instance.size();
    }

    pub fn merge(&mut self, other: Reachability) {
        self.roots += other.roots;
        self.objects += other.objects;
        self.shallow_size += other.shallow_size;
        for (heap, tally) in other.per_heap {
            let t = self.per_heap.entry(heap).or_default();
            t.objects += tally.objects;
            t.shallow_size += tally.shallow_size;
        }
        self.malformed.extend(other.malformed);
    }
}

/// Counts every instance reachable from the seeds it is offered.
pub struct ReachabilityVisitor<'s> {
    work: WorkList<'s>,
    result: Reachability,
}

impl<'s> ReachabilityVisitor<'s> {
    pub fn new(epoch: Epoch) -> Self {
        ReachabilityVisitor {
            work: WorkList::new(epoch),
            result: Reachability::default(),
        }
    }

    pub fn into_result(self) -> Reachability {
        self.result
    }
}

impl<'s> Visitor<'s> for ReachabilityVisitor<'s> {
    fn visit_root(&mut self, _root: &'s RootObj) {
        self.result.roots += 1;
    }

    fn visit_class_obj(&mut self, instance: &'s Instance, _class: &'s ClassObj) {
        self.result.record(instance);
    }

    fn visit_class_instance(&mut self, instance: &'s Instance, _object: &'s ClassInstance) {
        self.result.record(instance);
    }

    fn visit_array_instance(&mut self, instance: &'s Instance, _array: &'s ArrayInstance) {
        self.result.record(instance);
    }

    fn visit_later(&mut self, instance: &'s Instance) {
        self.work.push(instance);
    }

    fn next_pending(&mut self) -> Option<&'s Instance> {
        self.work.pop()
    }
}

fn finish<'s>(snapshot: &'s Snapshot, mut visitor: ReachabilityVisitor<'s>) -> Reachability {
    let stats = walk(snapshot, &mut visitor);
    let mut result = visitor.into_result();
    debug_assert_eq!(stats.visited, result.objects);
    result.malformed = stats.malformed;
    result
}

/// Everything reachable from the snapshot's GC roots, in a fresh epoch.
pub fn reachable(snapshot: &Snapshot) -> Reachability {
    let mut visitor = ReachabilityVisitor::new(snapshot.new_epoch());
    seed_roots(snapshot, &mut visitor);
    finish(snapshot, visitor)
}

/// Everything reachable from `ids`, in a fresh epoch. Ids that do not
/// resolve are ignored.
pub fn reachable_from(snapshot: &Snapshot, ids: &[Id]) -> Reachability {
    let mut visitor = ReachabilityVisitor::new(snapshot.new_epoch());
    for id in ids {
        if let Some(instance) = snapshot.find_reference(*id) {
            visitor.visit_later(instance);
        }
    }
    finish(snapshot, visitor)
}
