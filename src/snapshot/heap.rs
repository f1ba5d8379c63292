use std::collections::HashMap;

use super::{ClassObj, HeapId, Id, Instance};
use crate::error::{HeapError, Result};

/// A named partition of the snapshot, e.g. the zygote, image or app heap.
///
/// Owns the instances (class objects included) captured in it.
#[derive(Debug)]
pub struct Heap {
    id: HeapId,
    name: String,
    instances: HashMap<Id, Instance>,
    class_ids: Vec<Id>,
    classes_by_name: HashMap<String, Id>,
}

impl Heap {
    pub fn new(id: HeapId, name: impl Into<String>) -> Self {
        Heap {
            id,
            name: name.into(),
            instances: HashMap::new(),
            class_ids: vec![],
            classes_by_name: HashMap::new(),
        }
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn insert(&mut self, mut instance: Instance) -> Result<()> {
        let id = instance.id();
        if self.instances.contains_key(&id) {
            return Err(HeapError::DuplicateId(id));
        }
        instance.set_heap(self.id);
        if let Some(class) = instance.as_class() {
            self.class_ids.push(id);
            self.classes_by_name
                .entry(class.class_name().to_string())
                .or_insert(id);
        }
        self.instances.insert(id, instance);
        Ok(())
    }

    pub fn get_instance(&self, id: Id) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub(crate) fn get_instance_mut(&mut self, id: Id) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub fn get_class(&self, id: Id) -> Option<&ClassObj> {
        self.get_instance(id).and_then(Instance::as_class)
    }

    /// First class registered in this heap under `name`.
    pub fn get_class_by_name(&self, name: &str) -> Option<&ClassObj> {
        self.classes_by_name
            .get(name)
            .and_then(|id| self.get_class(*id))
    }

    /// Every instance, class objects included, in no particular order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Class objects in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassObj> {
        self.class_ids.iter().filter_map(|id| self.get_class(*id))
    }

    pub fn instances_count(&self) -> usize {
        self.instances.len()
    }

    pub fn classes_count(&self) -> usize {
        self.class_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut heap = Heap::new(3, "image");
        heap.insert(Instance::class(ClassObj::new(0x1, "A", 0)))
            .unwrap();
        heap.insert(Instance::object(0x2, 0x1, 0)).unwrap();
        assert_eq!(
            heap.insert(Instance::object(0x2, 0x1, 0)),
            Err(HeapError::DuplicateId(0x2))
        );
        assert_eq!(heap.instances_count(), 2);
        assert_eq!(heap.classes_count(), 1);
        assert_eq!(heap.get_instance(0x2).unwrap().heap_id(), 3);
        assert!(heap.get_class(0x2).is_none());
        assert_eq!(heap.get_class_by_name("A").unwrap().id(), 0x1);
        assert!(heap.get_class_by_name("B").is_none());
        assert_eq!(heap.classes().count(), 1);
    }
}
