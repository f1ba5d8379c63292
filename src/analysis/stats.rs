use std::time::Duration;

use crate::visit::Reachability;

#[derive(Debug, Default)]
pub struct WalkReport {
    pub threads: usize,
    pub iterations: usize,
    /// Duration of the final iteration
    pub time: Duration,
    pub result: Option<Reachability>,
}

impl WalkReport {
    pub fn print(&self) {
        let Some(result) = &self.result else {
            warn!("No walk was run, nothing to tabulate");
            return;
        };
        println!("============================ Tabulate Statistics ============================");
        print!("threads\titerations\ttime\troots\tobjects\tsize\tmalformed");
        for heap in result.per_heap.keys() {
            print!("\tobjects.{}\tsize.{}", heap, heap);
        }
        println!();
        print!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.threads,
            self.iterations,
            self.time.as_micros(),
            result.roots,
            result.objects,
            result.shallow_size,
            result.malformed.len()
        );
        for tally in result.per_heap.values() {
            print!("\t{}\t{}", tally.objects, tally.shallow_size);
        }
        println!();
        println!("-------------------------- End Tabulate Statistics --------------------------");
        debug_assert_eq!(
            result.objects,
            result.per_heap.values().map(|t| t.objects).sum::<u64>()
        );
    }
}
