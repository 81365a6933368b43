//! Long-lived worker threads with capacity-1 mailboxes.
//!
//! The trainer owns one [`WorkerThread`] per shard. Each round it submits
//! one task per worker and waits on the returned [`Completion`]s, which is
//! the only synchronization between workers. One queue per worker (instead
//! of a shared queue) keeps the round barrier cheap and lets the trainer
//! assign shard indices deterministically; workers do not steal.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Job {
    Run(Task, SyncSender<Result<(), String>>),
    /// Shutdown sentinel; the thread exits after observing it.
    Shutdown,
}

/// Handle for one submitted task.
pub struct Completion {
    rx: Receiver<Result<(), String>>,
}

impl Completion {
    /// Block until the task ran. A panicking task (or a dead worker)
    /// surfaces as `Err` with the panic message.
    pub fn wait(self) -> Result<(), String> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err("worker disconnected".to_string()))
    }
}

/// One long-lived executor thread consuming tasks from its own
/// single-producer single-consumer mailbox of capacity 1.
pub struct WorkerThread {
    mailbox: SyncSender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawn the executor thread.
    ///
    /// `numa_node` is an advisory placement hint carried over from the
    /// design; no supported platform binds to it currently.
    pub fn spawn(numa_node: Option<usize>) -> Self {
        let (mailbox, jobs) = sync_channel::<Job>(1);
        let handle = thread::Builder::new()
            .name("parsgd-worker".to_string())
            .spawn(move || worker_loop(jobs, numa_node))
            .expect("failed to spawn worker thread");
        Self {
            mailbox,
            handle: Some(handle),
        }
    }

    /// Enqueue a task. Blocks only while the previous task on this worker
    /// has not been taken (capacity-1 back-pressure); the trainer waits on
    /// all completions at the round barrier, so in practice the mailbox is
    /// always empty here.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Completion {
        let (done, rx) = sync_channel(1);
        // A send failure means the worker is gone; the dropped `done`
        // sender makes wait() report the disconnect.
        let _ = self.mailbox.send(Job::Run(Box::new(task), done));
        Completion { rx }
    }

    /// Submit the shutdown sentinel and join the thread.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.mailbox.send(Job::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(jobs: Receiver<Job>, _numa_node: Option<usize>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Run(task, done) => {
                let result = catch_unwind(AssertUnwindSafe(task)).map_err(panic_message);
                let _ = done.send(result);
            }
            Job::Shutdown => break,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker task panicked".to_string()
    }
}
