use std::sync::atomic::{AtomicI32, Ordering};

/// Provides multithreading dispatch primitives and a thread count for the simulation to use.
///
/// Note that the simulation does not require a true load balancing for loop implementation. All that's needed is a way to jumpstart some threads.
/// Systems which use multithreading hand out their own work through [`JobCounter`]s, so the dispatcher only has to run a closure on
/// some number of workers and wait for all of them to finish.
///
/// This is important when a user wants to share some other thread pool. Instead of worrying about load balancing,
/// they can just wrap whatever implementation they happen to have and it'll probably work fine.
pub trait IThreadDispatcher: Sync {
    /// Gets the number of workers available in the thread dispatcher.
    fn thread_count(&self) -> usize;

    /// Dispatches workers and blocks until every one of them has returned.
    ///
    /// # Arguments
    ///
    /// * `worker_body` - Closure to be invoked on every worker with the worker's index.
    /// * `maximum_worker_count` - Maximum number of workers to dispatch.
    fn dispatch_workers(&self, worker_body: &(dyn Fn(usize) + Sync), maximum_worker_count: usize);
}

/// Dispatcher which spins up scoped threads for every dispatch.
///
/// Dispatches in this crate happen once or twice per frame, so the cost of spawning is acceptable for
/// simple setups and tests. Applications with their own pool should implement [`IThreadDispatcher`] over it.
#[derive(Debug, Clone)]
pub struct SimpleThreadDispatcher {
    thread_count: usize,
}

impl SimpleThreadDispatcher {
    /// Creates a dispatcher with the given number of workers. At least one worker is always used.
    pub fn new(thread_count: usize) -> Self {
        Self {
            thread_count: thread_count.max(1),
        }
    }

    /// Creates a dispatcher with one worker per available hardware thread.
    pub fn with_available_parallelism() -> Self {
        let thread_count = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(thread_count)
    }
}

impl IThreadDispatcher for SimpleThreadDispatcher {
    fn thread_count(&self) -> usize {
        self.thread_count
    }

    fn dispatch_workers(&self, worker_body: &(dyn Fn(usize) + Sync), maximum_worker_count: usize) {
        let worker_count = self.thread_count.min(maximum_worker_count);
        if worker_count <= 1 {
            worker_body(0);
            return;
        }
        let result = crossbeam_utils::thread::scope(|scope| {
            // The calling thread acts as worker 0.
            for worker_index in 1..worker_count {
                scope.spawn(move |_| worker_body(worker_index));
            }
            worker_body(0);
        });
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }
}

/// Hands out contiguous ranges of a loop to workers that claim them concurrently.
#[derive(Debug)]
pub struct JobCounter {
    available_job_count: AtomicI32,
    job_size: i32,
    loop_iteration_count: i32,
}

impl JobCounter {
    /// Splits `loop_iteration_count` iterations into roughly `jobs_per_worker` jobs per worker.
    pub fn new(loop_iteration_count: usize, worker_count: usize, jobs_per_worker: usize) -> Self {
        let loop_iteration_count = loop_iteration_count as i32;
        let target_job_count = (worker_count.max(1) * jobs_per_worker.max(1)) as i32;
        let job_size = (loop_iteration_count / target_job_count).max(1);
        let mut available = loop_iteration_count / job_size;
        if job_size * available < loop_iteration_count {
            available += 1;
        }
        Self {
            available_job_count: AtomicI32::new(available),
            job_size,
            loop_iteration_count,
        }
    }

    /// Claims the next job, returning its `start..end` range, or `None` once every job has been taken.
    pub fn try_get_job(&self) -> Option<std::ops::Range<usize>> {
        let job_index = self.available_job_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if job_index < 0 {
            return None;
        }
        let start = job_index * self.job_size;
        let exclusive_end = (start + self.job_size).min(self.loop_iteration_count);
        Some(start as usize..exclusive_end as usize)
    }
}
