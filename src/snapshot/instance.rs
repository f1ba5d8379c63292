use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use smallvec::SmallVec;
use spin::Mutex;

use super::{ClassObj, Heap, HeapId, Id, Snapshot, StackTrace};
use crate::buffer::{Type, Value};
use crate::constants::UNVISITED_EPOCH;
use crate::error::{MalformedDump, Result};
use crate::field::Field;
use crate::visit::{Epoch, Visitor};

/// An instance of a class. Field values stay in the dump buffer until asked
/// for, laid out class by class from the concrete class up to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInstance {
    class_id: Id,
    values_offset: usize,
}

impl ClassInstance {
    pub fn class_id(&self) -> Id {
        self.class_id
    }

    pub fn values_offset(&self) -> usize {
        self.values_offset
    }
}

/// An array of references or of primitives; elements are stored back to
/// back in the dump buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInstance {
    element_type: Type,
    length: u32,
    values_offset: usize,
    array_class_id: Id,
}

impl ArrayInstance {
    pub fn element_type(&self) -> Type {
        self.element_type
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn values_offset(&self) -> usize {
        self.values_offset
    }

    pub fn array_class_id(&self) -> Id {
        self.array_class_id
    }

    pub fn values(&self, snapshot: &Snapshot) -> Result<Vec<Value>, MalformedDump> {
        let mut cursor = snapshot.buffer().cursor(self.values_offset);
        (0..self.length)
            .map(|_| cursor.read_value(self.element_type))
            .collect()
    }
}

#[derive(Debug)]
pub enum InstanceKind {
    Class(ClassObj),
    Object(ClassInstance),
    Array(ArrayInstance),
}

/// One object reconstructed from the dump.
///
/// Instances are owned by their [`Heap`]; everything else refers to them by
/// id. The only state that changes after the snapshot is built is traversal
/// bookkeeping: the epoch mark, whether this instance has registered itself
/// as a referrer of its neighbours, and the referrers registered on it.
#[derive(Debug)]
pub struct Instance {
    id: Id,
    heap: HeapId,
    stack_serial: Option<u32>,
    size: u64,
    kind: InstanceKind,
    references_added: AtomicBool,
    mark: AtomicU32,
    referrers: Mutex<SmallVec<[Id; 2]>>,
}

impl Instance {
    fn new(id: Id, kind: InstanceKind) -> Self {
        Instance {
            id,
            heap: 0,
            stack_serial: None,
            size: 0,
            kind,
            references_added: AtomicBool::new(false),
            mark: AtomicU32::new(UNVISITED_EPOCH),
            referrers: Mutex::new(SmallVec::new()),
        }
    }

    pub fn class(class: ClassObj) -> Self {
        Self::new(class.id(), InstanceKind::Class(class))
    }

    pub fn object(id: Id, class_id: Id, values_offset: usize) -> Self {
        Self::new(
            id,
            InstanceKind::Object(ClassInstance {
                class_id,
                values_offset,
            }),
        )
    }

    pub fn array(id: Id, element_type: Type, length: u32, values_offset: usize) -> Self {
        Self::new(
            id,
            InstanceKind::Array(ArrayInstance {
                element_type,
                length,
                values_offset,
                array_class_id: 0,
            }),
        )
    }

    pub fn with_array_class(mut self, array_class_id: Id) -> Self {
        if let InstanceKind::Array(a) = &mut self.kind {
            a.array_class_id = array_class_id;
        }
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_stack(mut self, stack_serial: u32) -> Self {
        self.stack_serial = Some(stack_serial);
        self
    }

    pub(crate) fn set_heap(&mut self, heap: HeapId) {
        self.heap = heap;
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn heap_id(&self) -> HeapId {
        self.heap
    }

    pub fn heap<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s Heap> {
        snapshot.heap(self.heap)
    }

    /// Shallow size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    pub fn as_class(&self) -> Option<&ClassObj> {
        match &self.kind {
            InstanceKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_class_mut(&mut self) -> Option<&mut ClassObj> {
        match &mut self.kind {
            InstanceKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn stack_serial(&self) -> Option<u32> {
        self.stack_serial
    }

    pub fn allocation_stack<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s StackTrace> {
        self.stack_serial.and_then(|s| snapshot.stack_trace(s))
    }

    /// Class this is an instance of. Class objects answer `None`.
    pub fn class_obj<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s ClassObj> {
        match &self.kind {
            InstanceKind::Class(_) => None,
            InstanceKind::Object(o) => snapshot.find_class(o.class_id),
            InstanceKind::Array(a) => snapshot.find_class(a.array_class_id),
        }
    }

    /// Instance field values, own class first, then each superclass.
    ///
    /// Empty for class objects, arrays, and instances of a class the
    /// snapshot does not contain.
    pub fn field_values(&self, snapshot: &Snapshot) -> Result<Vec<(Field, Value)>> {
        let InstanceKind::Object(o) = &self.kind else {
            return Ok(vec![]);
        };
        let Some(class) = snapshot.find_class(o.class_id) else {
            return Ok(vec![]);
        };
        let mut cursor = snapshot.buffer().cursor(o.values_offset);
        let mut values = vec![];
        for clazz in class.super_chain(snapshot)? {
            for field in clazz.fields() {
                values.push((field.clone(), cursor.read_value(field.ty())?));
            }
        }
        Ok(values)
    }

    /// Reference values of the instance fields, in [`field_values`] order.
    /// Walks the class chain in place rather than collecting it.
    ///
    /// [`field_values`]: Self::field_values
    fn field_references(&self, object: &ClassInstance, snapshot: &Snapshot) -> Result<Vec<Id>> {
        let Some(class) = snapshot.find_class(object.class_id) else {
            return Ok(vec![]);
        };
        class.check_acyclic(snapshot)?;
        let mut cursor = snapshot.buffer().cursor(object.values_offset);
        let mut references = vec![];
        let mut clazz = Some(class);
        while let Some(c) = clazz {
            for field in c.fields() {
                if let Some(id) = cursor.read_value(field.ty())?.as_reference() {
                    references.push(id);
                }
            }
            clazz = c.super_class_obj(snapshot);
        }
        Ok(references)
    }

    /// Ids this instance refers to. Null references are left out; ids that
    /// do not resolve are kept.
    pub fn outgoing_references(&self, snapshot: &Snapshot) -> Result<Vec<Id>> {
        Ok(match &self.kind {
            InstanceKind::Class(c) => c.static_references(snapshot)?,
            InstanceKind::Object(o) => self.field_references(o, snapshot)?,
            InstanceKind::Array(a) if a.element_type.is_reference() => a
                .values(snapshot)?
                .iter()
                .filter_map(Value::as_reference)
                .collect(),
            InstanceKind::Array(_) => vec![],
        })
    }

    /// Hands this instance to `visitor`, then offers every resolvable
    /// neighbour to `visitor.visit_later`.
    ///
    /// The first successful call also registers this instance as a referrer
    /// of each neighbour; later calls skip that step. Neighbour ids that do
    /// not resolve are ignored. A decode failure is returned before any
    /// neighbour is offered.
    pub fn accept<'s, V: Visitor<'s> + ?Sized>(
        &'s self,
        snapshot: &'s Snapshot,
        visitor: &mut V,
    ) -> Result<()> {
        match &self.kind {
            InstanceKind::Class(c) => visitor.visit_class_obj(self, c),
            InstanceKind::Object(o) => visitor.visit_class_instance(self, o),
            InstanceKind::Array(a) => visitor.visit_array_instance(self, a),
        }
        let references = self.outgoing_references(snapshot)?;
        let first = self
            .references_added
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        for id in references {
            let Some(value) = snapshot.find_reference(id) else {
                continue;
            };
            if first {
                value.add_referrer(self.id);
            }
            visitor.visit_later(value);
        }
        Ok(())
    }

    pub fn references_added(&self) -> bool {
        self.references_added.load(Ordering::Acquire)
    }

    pub(crate) fn add_referrer(&self, referrer: Id) {
        let mut referrers = self.referrers.lock();
        if !referrers.contains(&referrer) {
            referrers.push(referrer);
        }
    }

    /// Instances that registered a reference to this one, in registration
    /// order.
    pub fn referrers(&self) -> Vec<Id> {
        self.referrers.lock().to_vec()
    }

    /// Stamps this instance with `epoch`. Returns false when it already
    /// carried that stamp, i.e. another caller got there first.
    pub fn mark(&self, epoch: Epoch) -> bool {
        let epoch = epoch.raw();
        let mut old = self.mark.load(Ordering::Relaxed);
        loop {
            if old == epoch {
                return false;
            }
            match self
                .mark
                .compare_exchange_weak(old, epoch, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(x) => old = x,
            }
        }
    }

    pub fn is_marked(&self, epoch: Epoch) -> bool {
        self.mark.load(Ordering::Relaxed) == epoch.raw()
    }
}
