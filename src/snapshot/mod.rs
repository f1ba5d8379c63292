//! The object graph of one captured heap dump.
//!
//! A [`Snapshot`] is assembled once through a [`SnapshotBuilder`] and is
//! read-only afterwards, apart from the traversal bookkeeping kept on each
//! [`Instance`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::DumpBuffer;
use crate::constants::UNVISITED_EPOCH;
use crate::error::{HeapError, Result};
use crate::visit::Epoch;

mod class_obj;
mod heap;
mod instance;
mod root;
mod stack;

pub use class_obj::ClassObj;
pub use heap::Heap;
pub use instance::{ArrayInstance, ClassInstance, Instance, InstanceKind};
pub use root::{RootObj, RootType};
pub use stack::{StackFrame, StackTrace};

/// Object id, unique across the whole snapshot. 0 is null.
pub type Id = u64;
/// Heap partition id.
pub type HeapId = u32;

#[derive(Debug)]
pub struct Snapshot {
    buffer: DumpBuffer,
    heaps: Vec<Heap>,
    roots: Vec<RootObj>,
    stack_traces: HashMap<u32, StackTrace>,
    last_epoch: AtomicU32,
}

impl Snapshot {
    fn new(buffer: DumpBuffer) -> Self {
        Snapshot {
            buffer,
            heaps: vec![],
            roots: vec![],
            stack_traces: HashMap::new(),
            last_epoch: AtomicU32::new(UNVISITED_EPOCH),
        }
    }

    pub fn buffer(&self) -> &DumpBuffer {
        &self.buffer
    }

    pub fn heaps(&self) -> &[Heap] {
        &self.heaps
    }

    pub fn heap(&self, id: HeapId) -> Option<&Heap> {
        self.heaps.iter().find(|h| h.id() == id)
    }

    pub fn heap_by_name(&self, name: &str) -> Option<&Heap> {
        self.heaps.iter().find(|h| h.name() == name)
    }

    fn heap_mut(&mut self, id: HeapId) -> Option<&mut Heap> {
        self.heaps.iter_mut().find(|h| h.id() == id)
    }

    pub fn roots(&self) -> &[RootObj] {
        &self.roots
    }

    pub fn stack_trace(&self, serial: u32) -> Option<&StackTrace> {
        self.stack_traces.get(&serial)
    }

    /// The instance with `id` in any heap. Absent ids are normal: dumps
    /// routinely name objects that were filtered out during capture.
    pub fn find_reference(&self, id: Id) -> Option<&Instance> {
        self.heaps.iter().find_map(|h| h.get_instance(id))
    }

    pub fn find_class(&self, id: Id) -> Option<&ClassObj> {
        self.find_reference(id).and_then(Instance::as_class)
    }

    pub fn find_class_by_name(&self, name: &str) -> Option<&ClassObj> {
        self.heaps.iter().find_map(|h| h.get_class_by_name(name))
    }

    fn find_reference_mut(&mut self, id: Id) -> Option<&mut Instance> {
        self.heaps.iter_mut().find_map(|h| h.get_instance_mut(id))
    }

    fn find_class_mut(&mut self, id: Id) -> Option<&mut ClassObj> {
        self.find_reference_mut(id).and_then(Instance::as_class_mut)
    }

    pub fn instances_count(&self) -> usize {
        self.heaps.iter().map(Heap::instances_count).sum()
    }

    pub fn classes_count(&self) -> usize {
        self.heaps.iter().map(Heap::classes_count).sum()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassObj> {
        self.heaps.iter().flat_map(Heap::classes)
    }

    /// Starts a new traversal epoch. Marks left behind by earlier,
    /// possibly abandoned, traversals do not count in the new one.
    pub fn new_epoch(&self) -> Epoch {
        loop {
            let epoch = self.last_epoch.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            if epoch != UNVISITED_EPOCH {
                return Epoch::new(epoch);
            }
        }
    }
}

/// Populates a [`Snapshot`].
///
/// Entities can be added in any order. Instance registration with their
/// classes and subclass links are resolved once, in [`build`](Self::build).
pub struct SnapshotBuilder {
    snapshot: Snapshot,
    pending: Vec<(HeapId, Id)>,
}

impl SnapshotBuilder {
    pub fn new(buffer: DumpBuffer) -> Self {
        SnapshotBuilder {
            snapshot: Snapshot::new(buffer),
            pending: vec![],
        }
    }

    /// Adds a heap partition. Adding a heap again under the same name is
    /// a no-op.
    pub fn add_heap(&mut self, id: HeapId, name: &str) -> Result<()> {
        match self.snapshot.heap(id) {
            Some(heap) if heap.name() == name => Ok(()),
            Some(heap) => Err(HeapError::HeapNameConflict {
                heap: id,
                existing: heap.name().to_string(),
                requested: name.to_string(),
            }),
            None => {
                self.snapshot.heaps.push(Heap::new(id, name));
                Ok(())
            }
        }
    }

    fn insert(&mut self, heap: HeapId, instance: Instance) -> Result<()> {
        if self.snapshot.find_reference(instance.id()).is_some() {
            return Err(HeapError::DuplicateId(instance.id()));
        }
        self.snapshot
            .heap_mut(heap)
            .ok_or(HeapError::UnknownHeap(heap))?
            .insert(instance)
    }

    /// Adds a class object of shallow size `size`.
    pub fn add_class(&mut self, heap: HeapId, class: ClassObj, size: u64) -> Result<()> {
        self.insert(heap, Instance::class(class).with_size(size))
    }

    /// Adds an instance or array. It is registered with its class when the
    /// snapshot is built.
    pub fn add_instance(&mut self, heap: HeapId, instance: Instance) -> Result<()> {
        let id = instance.id();
        let registers = !matches!(instance.kind(), InstanceKind::Class(_));
        self.insert(heap, instance)?;
        if registers {
            self.pending.push((heap, id));
        }
        Ok(())
    }

    pub fn add_root(&mut self, root: RootObj) {
        self.snapshot.roots.push(root);
    }

    pub fn add_stack_trace(&mut self, trace: StackTrace) {
        self.snapshot.stack_traces.insert(trace.serial, trace);
    }

    pub fn class_mut(&mut self, id: Id) -> Option<&mut ClassObj> {
        self.snapshot.find_class_mut(id)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn build(mut self) -> Snapshot {
        let mut unregistered = 0;
        for (heap, id) in std::mem::take(&mut self.pending) {
            let Some(instance) = self.snapshot.find_reference(id) else {
                continue;
            };
            let size = instance.size();
            let class_id = match instance.kind() {
                InstanceKind::Object(o) => o.class_id(),
                InstanceKind::Array(a) => a.array_class_id(),
                InstanceKind::Class(_) => continue,
            };
            match self.snapshot.find_class_mut(class_id) {
                Some(class) => class.register_instance(heap, id, size),
                None => unregistered += 1,
            }
        }
        if unregistered != 0 {
            debug!("{} instances name a class missing from the dump", unregistered);
        }

        let links: Vec<(Id, Id)> = self
            .snapshot
            .classes()
            .filter(|c| c.super_class_id() != 0)
            .map(|c| (c.super_class_id(), c.id()))
            .collect();
        for (parent, child) in links {
            if let Some(parent) = self.snapshot.find_class_mut(parent) {
                parent.add_subclass(child);
            }
        }

        info!(
            "Built snapshot with {} heaps, {} instances and {} roots",
            self.snapshot.heaps.len(),
            self.snapshot.instances_count(),
            self.snapshot.roots.len()
        );
        self.snapshot
    }
}
