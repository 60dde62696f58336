// Domain models: node counters, deltas and periodic samples

mod counter;
mod sample;

pub use counter::{Counter, CounterSnapshot, DeltaRecord, NodeCounter};
pub use sample::Sample;
