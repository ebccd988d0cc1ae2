mod counters;
mod reporter;
mod runner;
pub mod scheduler;
mod worker;

pub use counters::RunCounters;
pub use runner::Engine;
pub use scheduler::DispatchState;
