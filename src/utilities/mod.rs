pub mod memory;
pub mod thread_dispatcher;

pub use thread_dispatcher::{IThreadDispatcher, JobCounter, SimpleThreadDispatcher};
