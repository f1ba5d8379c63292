use crossbeam::deque::{Injector, Steal, Stealer, Worker};

use super::{walk, Epoch, Reachability, Visitor};
use crate::snapshot::{ArrayInstance, ClassInstance, ClassObj, Instance, Snapshot};

/// One thread of a parallel reachability walk. Newly found instances go to
/// the local LIFO queue; an idle worker takes from the root injector first,
/// then from its peers.
struct ParWorker<'s, 'w> {
    id: usize,
    epoch: Epoch,
    queue: Worker<&'s Instance>,
    injector: &'w Injector<&'s Instance>,
    stealers: &'w [Stealer<&'s Instance>],
    result: Reachability,
}

impl<'s, 'w> ParWorker<'s, 'w> {
    fn steal(&self) -> Option<&'s Instance> {
        loop {
            match self.injector.steal_batch_and_pop(&self.queue) {
                Steal::Success(instance) => return Some(instance),
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
        loop {
            let mut retry = false;
            for (i, stealer) in self.stealers.iter().enumerate() {
                if i == self.id {
                    continue;
                }
                match stealer.steal_batch_and_pop(&self.queue) {
                    Steal::Success(instance) => return Some(instance),
                    Steal::Retry => retry = true,
                    Steal::Empty => {}
                }
            }
            if !retry {
                return None;
            }
        }
    }
}

impl<'s, 'w> Visitor<'s> for ParWorker<'s, 'w> {
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
        if instance.mark(self.epoch) {
            self.queue.push(instance);
        }
    }

    fn next_pending(&mut self) -> Option<&'s Instance> {
        self.queue.pop().or_else(|| self.steal())
    }
}

/// [`reachable`](super::reachable) spread over `threads` work-stealing
/// threads. Every instance is still counted exactly once: the epoch mark
/// decides which thread gets it.
pub fn par_reachable(snapshot: &Snapshot, threads: usize) -> Reachability {
    let threads = threads.max(1);
    let epoch = snapshot.new_epoch();
    let injector = Injector::new();
    let mut result = Reachability::default();
    for root in snapshot.roots() {
        result.roots += 1;
        if let Some(instance) = root.referent(snapshot) {
            if instance.mark(epoch) {
                injector.push(instance);
            }
        }
    }

    let queues: Vec<Worker<&Instance>> = (0..threads).map(|_| Worker::new_lifo()).collect();
    let stealers: Vec<Stealer<&Instance>> = queues.iter().map(Worker::stealer).collect();
    let partials: Vec<Reachability> = std::thread::scope(|s| {
        let handles: Vec<_> = queues
            .into_iter()
            .enumerate()
            .map(|(id, queue)| {
                let injector = &injector;
                let stealers = &stealers[..];
                s.spawn(move || {
                    let mut worker = ParWorker {
                        id,
                        epoch,
                        queue,
                        injector,
                        stealers,
                        result: Reachability::default(),
                    };
                    let stats = walk(snapshot, &mut worker);
                    debug_assert!(worker.queue.is_empty());
                    trace!("Worker {} visited {} instances", id, stats.visited);
                    let mut result = worker.result;
                    result.malformed = stats.malformed;
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });
    for partial in partials {
        result.merge(partial);
    }
    result.malformed.sort_by_key(|(id, _)| *id);
    result
}
