pub mod scheduler;

pub use scheduler::ReviewScheduler;
