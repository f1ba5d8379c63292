use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{HeapId, Id, Instance, Snapshot};
use crate::buffer::{Type, Value};
use crate::error::{HeapError, MalformedDump, Result};
use crate::field::Field;

/// Metadata of one loaded class.
///
/// Links to other entities (superclass, class loader, subclasses, instances)
/// are raw ids resolved through the [`Snapshot`], so a class can be
/// registered before the classes it names, or name classes the dump never
/// contained.
///
/// Identity is the class name: ordering, equality and hashing ignore
/// everything else.
#[derive(Debug)]
pub struct ClassObj {
    id: Id,
    class_name: String,
    static_fields_offset: usize,
    super_class_id: Id,
    class_loader_id: Id,
    fields: Vec<Field>,
    static_fields: Vec<Field>,
    instance_size: u32,
    shallow_size: u64,
    instances: BTreeMap<HeapId, Vec<Id>>,
    subclasses: BTreeSet<Id>,
}

impl ClassObj {
    pub fn new(id: Id, class_name: impl Into<String>, static_fields_offset: usize) -> Self {
        ClassObj {
            id,
            class_name: class_name.into(),
            static_fields_offset,
            super_class_id: 0,
            class_loader_id: 0,
            fields: vec![],
            static_fields: vec![],
            instance_size: 0,
            shallow_size: 0,
            instances: BTreeMap::new(),
            subclasses: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn static_fields_offset(&self) -> usize {
        self.static_fields_offset
    }

    pub fn set_static_fields_offset(&mut self, offset: usize) {
        self.static_fields_offset = offset;
    }

    pub fn super_class_id(&self) -> Id {
        self.super_class_id
    }

    pub fn set_super_class_id(&mut self, id: Id) {
        self.super_class_id = id;
    }

    pub fn class_loader_id(&self) -> Id {
        self.class_loader_id
    }

    pub fn set_class_loader_id(&mut self, id: Id) {
        self.class_loader_id = id;
    }

    /// Declared instance fields, not including inherited ones.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_fields(&mut self, fields: Vec<Field>) {
        self.fields = fields;
    }

    pub fn static_fields(&self) -> &[Field] {
        &self.static_fields
    }

    pub fn set_static_fields(&mut self, static_fields: Vec<Field>) {
        self.static_fields = static_fields;
    }

    /// Storage size of a new instance of this class.
    pub fn instance_size(&self) -> u32 {
        self.instance_size
    }

    pub fn set_instance_size(&mut self, size: u32) {
        self.instance_size = size;
    }

    /// Sum of the shallow sizes of every instance added so far.
    pub fn shallow_size(&self) -> u64 {
        self.shallow_size
    }

    pub fn add_subclass(&mut self, subclass: Id) {
        self.subclasses.insert(subclass);
    }

    pub fn subclass_ids(&self) -> &BTreeSet<Id> {
        &self.subclasses
    }

    /// Direct subclasses that resolve in `snapshot`.
    pub fn subclasses<'s>(&self, snapshot: &'s Snapshot) -> Vec<&'s ClassObj> {
        self.subclasses
            .iter()
            .filter_map(|id| snapshot.find_class(*id))
            .collect()
    }

    /// Files `instance` under the heap it was captured in.
    pub fn add_instance(&mut self, instance: &Instance) {
        self.register_instance(instance.heap_id(), instance.id(), instance.size());
    }

    pub(crate) fn register_instance(&mut self, heap: HeapId, id: Id, size: u64) {
        self.shallow_size += size;
        self.instances.entry(heap).or_default().push(id);
    }

    /// Ids of the instances captured in `heap`, in insertion order.
    pub fn heap_instance_ids(&self, heap: HeapId) -> &[Id] {
        self.instances.get(&heap).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn heap_instances<'s>(&self, heap: HeapId, snapshot: &'s Snapshot) -> Vec<&'s Instance> {
        self.heap_instance_ids(heap)
            .iter()
            .filter_map(|id| snapshot.find_reference(*id))
            .collect()
    }

    pub fn heap_instances_count(&self, heap: HeapId) -> usize {
        self.heap_instance_ids(heap).len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }

    /// Every instance, by ascending heap id and then insertion order.
    pub fn instances_list<'s>(&self, snapshot: &'s Snapshot) -> Vec<&'s Instance> {
        let mut result = Vec::with_capacity(self.instance_count());
        for ids in self.instances.values() {
            result.extend(ids.iter().filter_map(|id| snapshot.find_reference(*id)));
        }
        result
    }

    pub fn super_class_obj<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s ClassObj> {
        snapshot.find_class(self.super_class_id)
    }

    pub fn class_loader<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s Instance> {
        snapshot.find_reference(self.class_loader_id)
    }

    /// This class followed by its resolvable superclasses.
    ///
    /// The walk stops at the first superclass id that does not resolve.
    /// A chain that comes back to a class already on it is an error.
    pub fn super_chain<'s>(&'s self, snapshot: &'s Snapshot) -> Result<Vec<&'s ClassObj>> {
        let mut seen: HashSet<Id> = HashSet::new();
        let mut chain = vec![];
        let mut clazz = Some(self);
        while let Some(c) = clazz {
            if !seen.insert(c.id) {
                return Err(HeapError::CyclicHierarchy {
                    class_id: self.id,
                    revisited: c.id,
                });
            }
            chain.push(c);
            clazz = c.super_class_obj(snapshot);
        }
        Ok(chain)
    }

    /// Same outcome as [`super_chain`](Self::super_chain) without building
    /// the chain. An acyclic chain visits each class at most once, so one
    /// that runs longer than the class count has looped.
    pub(crate) fn check_acyclic(&self, snapshot: &Snapshot) -> Result<()> {
        let limit = snapshot.classes_count();
        let mut steps = 0;
        let mut clazz = self.super_class_obj(snapshot);
        while let Some(c) = clazz {
            steps += 1;
            if steps >= limit {
                return self.super_chain(snapshot).map(|_| ());
            }
            clazz = c.super_class_obj(snapshot);
        }
        Ok(())
    }

    /// Number of instance fields including inherited ones.
    pub fn all_fields_count(&self, snapshot: &Snapshot) -> Result<usize> {
        Ok(self
            .super_chain(snapshot)?
            .iter()
            .map(|c| c.fields.len())
            .sum())
    }

    /// Decodes the static values in declaration order.
    ///
    /// The block at the static offset is an entry count followed by
    /// (name id, type tag, value) records. Name and tag repeat what the
    /// declared layout already says and are skipped; the declared type drives
    /// the value decode.
    pub(crate) fn decode_static_fields(
        &self,
        snapshot: &Snapshot,
    ) -> Result<Vec<(&Field, Value)>, MalformedDump> {
        let mut cursor = snapshot.buffer().cursor(self.static_fields_offset);
        let entries = cursor.read_u16()? as usize;
        if entries > self.static_fields.len() {
            return Err(MalformedDump::StaticFieldCount {
                class_id: self.id,
                recorded: entries,
                declared: self.static_fields.len(),
            });
        }
        let mut values = Vec::with_capacity(entries);
        for field in &self.static_fields[..entries] {
            cursor.read_id()?;
            cursor.read_u8()?;
            values.push((field, cursor.read_value(field.ty())?));
        }
        Ok(values)
    }

    /// Static values, decoded afresh from the buffer on every call.
    pub fn static_field_values(&self, snapshot: &Snapshot) -> Result<HashMap<Field, Value>> {
        Ok(self
            .decode_static_fields(snapshot)?
            .into_iter()
            .map(|(f, v)| (f.clone(), v))
            .collect())
    }

    pub fn static_field(&self, snapshot: &Snapshot, ty: Type, name: &str) -> Result<Option<Value>> {
        Ok(self
            .decode_static_fields(snapshot)?
            .into_iter()
            .find(|(f, _)| f.ty() == ty && f.name() == name)
            .map(|(_, v)| v))
    }

    /// Ids referenced from non-null static reference fields.
    pub(crate) fn static_references(&self, snapshot: &Snapshot) -> Result<Vec<Id>, MalformedDump> {
        Ok(self
            .decode_static_fields(snapshot)?
            .into_iter()
            .filter_map(|(_, v)| v.as_reference())
            .collect())
    }

    /// Human readable dump of static values and instance fields, repeated
    /// for every superclass.
    pub fn describe(&self, snapshot: &Snapshot) -> Result<String> {
        let mut out = String::new();
        for clazz in self.super_chain(snapshot)? {
            out.push_str(&format!("+----------  ClassObj dump for: {}\n", clazz.class_name));
            out.push_str("+-----  Static fields\n");
            for (field, value) in clazz.decode_static_fields(snapshot)? {
                out.push_str(&format!("{} = {}\n", field, value));
            }
            out.push_str("+-----  Instance fields\n");
            for field in &clazz.fields {
                out.push_str(&format!("{}\n", field));
            }
        }
        Ok(out)
    }
}

impl fmt::Display for ClassObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name.replace('/', "."))
    }
}

impl PartialEq for ClassObj {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
    }
}

impl Eq for ClassObj {}

impl PartialOrd for ClassObj {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassObj {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class_name.cmp(&other.class_name)
    }
}

impl Hash for ClassObj {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferWriter, IdSize};
    use crate::snapshot::SnapshotBuilder;

    const HEAP_DEFAULT: HeapId = 0;
    const HEAP_APP: HeapId = 1;

    fn class_with_fields(id: Id, name: &str, super_id: Id, n: usize) -> ClassObj {
        let mut c = ClassObj::new(id, name, 0);
        c.set_super_class_id(super_id);
        c.set_fields(
            (0..n)
                .map(|i| Field::new(Type::Int, format!("f{}", i)))
                .collect(),
        );
        c
    }

    fn hierarchy_snapshot(cyclic: bool) -> Snapshot {
        let mut w = BufferWriter::new(IdSize::LONG);
        let empty_statics = w.write_static_block(&[]);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        let grand_super = if cyclic { 0x30 } else { 0 };
        for mut c in [
            class_with_fields(0x10, "Grand", grand_super, 1),
            class_with_fields(0x20, "Parent", 0x10, 2),
            class_with_fields(0x30, "Self", 0x20, 3),
        ] {
            c.set_static_fields_offset(empty_statics);
            b.add_class(HEAP_DEFAULT, c, 0).unwrap();
        }
        b.build()
    }

    #[test]
    fn test_all_fields_count() {
        let snapshot = hierarchy_snapshot(false);
        let c = snapshot.find_class(0x30).unwrap();
        assert_eq!(c.all_fields_count(&snapshot), Ok(6));
        let chain: Vec<&str> = c
            .super_chain(&snapshot)
            .unwrap()
            .iter()
            .map(|c| c.class_name())
            .collect();
        assert_eq!(chain, vec!["Self", "Parent", "Grand"]);
    }

    #[test]
    fn test_all_fields_count_cycle() {
        let snapshot = hierarchy_snapshot(true);
        let c = snapshot.find_class(0x30).unwrap();
        assert_eq!(
            c.all_fields_count(&snapshot),
            Err(HeapError::CyclicHierarchy {
                class_id: 0x30,
                revisited: 0x30
            })
        );
        assert!(c.describe(&snapshot).is_err());
    }

    #[test]
    fn test_two_class_cycle() {
        let mut b = SnapshotBuilder::new(BufferWriter::new(IdSize::LONG).finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, class_with_fields(0xa, "A", 0xb, 1), 0)
            .unwrap();
        b.add_class(HEAP_DEFAULT, class_with_fields(0xb, "B", 0xa, 1), 0)
            .unwrap();
        let snapshot = b.build();
        let a = snapshot.find_class(0xa).unwrap();
        assert_eq!(
            a.all_fields_count(&snapshot),
            Err(HeapError::CyclicHierarchy {
                class_id: 0xa,
                revisited: 0xa
            })
        );
    }

    #[test]
    fn test_unresolved_super_is_root() {
        let mut b = SnapshotBuilder::new(BufferWriter::new(IdSize::LONG).finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, class_with_fields(0xa, "A", 0xdead, 4), 0)
            .unwrap();
        let snapshot = b.build();
        let a = snapshot.find_class(0xa).unwrap();
        assert!(a.super_class_obj(&snapshot).is_none());
        assert!(a.class_loader(&snapshot).is_none());
        assert_eq!(a.all_fields_count(&snapshot), Ok(4));
    }

    #[test]
    fn test_static_field_values() {
        let mut w = BufferWriter::new(IdSize::LONG);
        let offset = w.write_static_block(&[
            (0x100, Value::Int(0x7fff_0001)),
            (0x101, Value::Boolean(true)),
            (0x102, Value::Object(0x55)),
        ]);
        let mut class = ClassObj::new(0x1, "com/example/Config", offset);
        class.set_static_fields(vec![
            Field::new(Type::Int, "MAX"),
            Field::new(Type::Boolean, "DEBUG"),
            Field::new(Type::Object, "INSTANCE"),
        ]);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, class, 0).unwrap();
        let snapshot = b.build();
        let class = snapshot.find_class(0x1).unwrap();

        let values = class.static_field_values(&snapshot).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(
            values.get(&Field::new(Type::Int, "MAX")),
            Some(&Value::Int(0x7fff_0001))
        );
        assert_eq!(
            class.static_field(&snapshot, Type::Object, "INSTANCE"),
            Ok(Some(Value::Object(0x55)))
        );
        assert_eq!(class.static_field(&snapshot, Type::Int, "DEBUG"), Ok(None));
        // Decoding is repeatable
        assert_eq!(class.static_field_values(&snapshot).unwrap(), values);
        assert_eq!(class.static_references(&snapshot), Ok(vec![0x55]));
    }

    #[test]
    fn test_static_entry_count_bounds_decode() {
        // Two fields declared, one recorded: only the recorded one decodes
        let mut w = BufferWriter::new(IdSize::SHORT);
        let offset = w.write_static_block(&[(0x9, Value::Long(-5))]);
        w.write_u64(u64::MAX);
        let mut class = ClassObj::new(0x1, "A", offset);
        class.set_static_fields(vec![
            Field::new(Type::Long, "a"),
            Field::new(Type::Long, "b"),
        ]);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, class, 0).unwrap();
        let snapshot = b.build();
        let values = snapshot
            .find_class(0x1)
            .unwrap()
            .static_field_values(&snapshot)
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get(&Field::new(Type::Long, "a")),
            Some(&Value::Long(-5))
        );
    }

    #[test]
    fn test_static_field_malformed() {
        let mut w = BufferWriter::new(IdSize::LONG);
        // Claims one entry, but the record is cut short
        w.write_u16(1).write_u64(0x9).write_u8(Type::Int.tag());
        let mut truncated = ClassObj::new(0x1, "Truncated", 0);
        truncated.set_static_fields(vec![Field::new(Type::Int, "x")]);
        let mut overcounted = ClassObj::new(0x2, "Overcounted", 0);
        overcounted.set_static_fields(vec![]);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, truncated, 0).unwrap();
        b.add_class(HEAP_DEFAULT, overcounted, 0).unwrap();
        let snapshot = b.build();

        let err = snapshot
            .find_class(0x1)
            .unwrap()
            .static_field_values(&snapshot)
            .unwrap_err();
        assert!(err.is_malformed_dump());
        assert_eq!(
            snapshot
                .find_class(0x2)
                .unwrap()
                .static_field_values(&snapshot),
            Err(HeapError::MalformedDump(MalformedDump::StaticFieldCount {
                class_id: 0x2,
                recorded: 1,
                declared: 0
            }))
        );
    }

    #[test]
    fn test_instance_registry() {
        let mut b = SnapshotBuilder::new(BufferWriter::new(IdSize::LONG).finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_heap(HEAP_APP, "app").unwrap();
        b.add_class(HEAP_DEFAULT, ClassObj::new(0x1, "Node", 0), 0)
            .unwrap();
        // Registered out of heap order on purpose
        b.add_instance(HEAP_APP, Instance::object(0x10, 0x1, 0).with_size(16))
            .unwrap();
        b.add_instance(HEAP_DEFAULT, Instance::object(0x11, 0x1, 0).with_size(24))
            .unwrap();
        b.add_instance(HEAP_APP, Instance::object(0x12, 0x1, 0).with_size(32))
            .unwrap();
        let snapshot = b.build();
        let class = snapshot.find_class(0x1).unwrap();

        let ids: Vec<Id> = class
            .instances_list(&snapshot)
            .iter()
            .map(|i| i.id())
            .collect();
        assert_eq!(ids, vec![0x11, 0x10, 0x12]);
        assert_eq!(class.instance_count(), 3);
        assert_eq!(class.heap_instances_count(HEAP_APP), 2);
        assert_eq!(class.heap_instances_count(HEAP_DEFAULT), 1);
        assert_eq!(class.heap_instances_count(42), 0);
        assert!(class.heap_instances(42, &snapshot).is_empty());
        let total: u64 = class.instances_list(&snapshot).iter().map(|i| i.size()).sum();
        assert_eq!(total, class.shallow_size());
        assert_eq!(class.shallow_size(), 72);
        for heap in [HEAP_DEFAULT, HEAP_APP] {
            for i in class.heap_instances(heap, &snapshot) {
                assert_eq!(i.heap_id(), heap);
            }
        }
    }

    #[test]
    fn test_add_instance_direct() {
        let mut class = ClassObj::new(0x1, "Node", 0);
        let a = Instance::object(0x10, 0x1, 0).with_size(16);
        class.add_instance(&a);
        class.add_instance(&a);
        assert_eq!(class.shallow_size(), 32);
        assert_eq!(class.heap_instance_ids(a.heap_id()), &[0x10, 0x10]);
    }

    #[test]
    fn test_add_instance_uses_owning_heap() {
        let mut class = ClassObj::new(0x1, "Node", 0);
        let mut a = Instance::object(0x10, 0x1, 0).with_size(16);
        a.set_heap(HEAP_APP);
        class.add_instance(&a);
        assert_eq!(class.heap_instances_count(HEAP_APP), 1);
        assert_eq!(class.heap_instances_count(HEAP_DEFAULT), 0);
    }

    #[test]
    fn test_subclasses() {
        let mut parent = ClassObj::new(0x1, "Parent", 0);
        parent.add_subclass(0x2);
        parent.add_subclass(0x2);
        parent.add_subclass(0x3);
        assert_eq!(parent.subclass_ids().len(), 2);

        let snapshot = hierarchy_snapshot(false);
        let grand = snapshot.find_class(0x10).unwrap();
        let subs: Vec<&str> = grand
            .subclasses(&snapshot)
            .iter()
            .map(|c| c.class_name())
            .collect();
        assert_eq!(subs, vec!["Parent"]);
        assert!(snapshot.find_class(0x30).unwrap().subclasses(&snapshot).is_empty());
    }

    #[test]
    fn test_identity_by_name() {
        let a = ClassObj::new(0x1, "java/lang/String", 0);
        let b = ClassObj::new(0x2, "java/lang/String", 64);
        let c = ClassObj::new(0x3, "java/lang/Object", 0);
        assert_eq!(a, b);
        assert!(c < a);
        assert_eq!(a.to_string(), "java.lang.String");
    }

    #[test]
    fn test_describe() {
        let mut w = BufferWriter::new(IdSize::LONG);
        let offset = w.write_static_block(&[(0x1, Value::Int(3))]);
        let mut class = ClassObj::new(0x1, "A", offset);
        class.set_static_fields(vec![Field::new(Type::Int, "COUNT")]);
        class.set_fields(vec![Field::new(Type::Object, "next")]);
        let mut b = SnapshotBuilder::new(w.finish());
        b.add_heap(HEAP_DEFAULT, "default").unwrap();
        b.add_class(HEAP_DEFAULT, class, 0).unwrap();
        let snapshot = b.build();
        let text = snapshot.find_class(0x1).unwrap().describe(&snapshot).unwrap();
        assert!(text.contains("ClassObj dump for: A"));
        assert!(text.contains("COUNT: int = 3"));
        assert!(text.contains("next: Object"));
    }
}
