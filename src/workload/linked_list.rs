use super::{builder_with_heaps, heap_of, Workload, FIELD_NAME_ID_BASE};
use crate::buffer::{BufferWriter, IdSize, Type, Value};
use crate::error::Result;
use crate::field::Field;
use crate::snapshot::{
    ClassObj, Id, Instance, RootObj, RootType, Snapshot, StackFrame, StackTrace,
};

const NODE_CLASS_ID: Id = 0x10;
const NODE_BASE_ID: Id = 0x1000;
const NODE_SIZE: u64 = 16;
const CLASS_SIZE: u64 = 32;
const ALLOCATION_STACK: u32 = 1;

/// A singly linked list hanging off a static `HEAD` of the node class.
/// Only the node class is rooted, so every node is one hop further away
/// than the previous one.
pub struct LinkedList {
    num_nodes: usize,
}

impl LinkedList {
    pub fn new(num_nodes: usize) -> Self {
        LinkedList { num_nodes }
    }

    pub fn node_id(i: usize) -> Id {
        NODE_BASE_ID + i as Id
    }

    pub fn class_id() -> Id {
        NODE_CLASS_ID
    }
}

impl Workload for LinkedList {
    fn build(&self, heaps: usize) -> Result<Snapshot> {
        info!("Synthesizing a linked list of {} nodes", self.num_nodes);
        let mut w = BufferWriter::new(IdSize::LONG);
        let head = if self.num_nodes == 0 { 0 } else { Self::node_id(0) };
        let statics = w.write_static_block(&[(FIELD_NAME_ID_BASE, Value::Object(head))]);
        let mut offsets = Vec::with_capacity(self.num_nodes);
        for i in 0..self.num_nodes {
            let next = if i + 1 == self.num_nodes {
                0
            } else {
                Self::node_id(i + 1)
            };
            offsets.push(w.write_values(&[Value::Object(next), Value::Int(i as i32)]));
        }

        let mut node = ClassObj::new(NODE_CLASS_ID, "heapgraph/LinkedList$Node", statics);
        node.set_fields(vec![
            Field::new(Type::Object, "next"),
            Field::new(Type::Int, "value"),
        ]);
        node.set_static_fields(vec![Field::new(Type::Object, "HEAD")]);
        node.set_instance_size(NODE_SIZE as u32);

        let mut builder = builder_with_heaps(w.finish(), heaps)?;
        builder.add_class(0, node, CLASS_SIZE)?;
        builder.add_stack_trace(StackTrace::new(
            ALLOCATION_STACK,
            1,
            vec![
                StackFrame::new("append", "(I)V", "LinkedList.java", 42),
                StackFrame::new("main", "([Ljava/lang/String;)V", "Main.java", 7),
            ],
        ));
        for (i, offset) in offsets.into_iter().enumerate() {
            let instance = Instance::object(Self::node_id(i), NODE_CLASS_ID, offset)
                .with_size(NODE_SIZE)
                .with_stack(ALLOCATION_STACK);
            builder.add_instance(heap_of(i as u64, heaps), instance)?;
        }
        builder.add_root(RootObj::new(RootType::SystemClass, NODE_CLASS_ID, 0));
        Ok(builder.build())
    }
}
