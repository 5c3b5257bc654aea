//! Single-consumer execution context.
//!
//! One named thread owns the state `S` and runs posted mutations in FIFO
//! order. Workers never touch `S` directly; they post a closure back here.

use anyhow::{Context, Result};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub type Mutation<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Something that runs mutations of `S` on the consumer context.
pub trait DispatchSink<S>: Send + Sync {
    /// Queue `mutation`. Returns false if the context has shut down and the
    /// mutation was dropped.
    fn post(&self, mutation: Mutation<S>) -> bool;
}

/// Cloneable posting side of a [`ConsumerQueue`]
pub struct ConsumerHandle<S> {
    tx: async_channel::Sender<Mutation<S>>,
}

impl<S> Clone for ConsumerHandle<S> {
    fn clone(&self) -> Self {
        ConsumerHandle {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> DispatchSink<S> for ConsumerHandle<S> {
    fn post(&self, mutation: Mutation<S>) -> bool {
        // Unbounded channel: send_blocking only fails once closed
        self.tx.send_blocking(mutation).is_ok()
    }
}

pub struct ConsumerQueue<S> {
    handle: ConsumerHandle<S>,
    thread: Option<JoinHandle<()>>,
}

impl<S: 'static> ConsumerQueue<S> {
    /// Spawn the consumer thread. `init` builds the owned state and receives a
    /// handle so the state can post follow-up work to itself.
    pub fn spawn<F>(name: &str, init: F) -> Result<Self>
    where
        F: FnOnce(ConsumerHandle<S>) -> S + Send + 'static,
    {
        let (tx, rx) = async_channel::unbounded::<Mutation<S>>();
        let handle = ConsumerHandle { tx };
        let state_handle = handle.clone();
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut state = init(state_handle);
                debug!(context = %thread_name, "Consumer context started");
                while let Ok(mutation) = rx.recv_blocking() {
                    mutation(&mut state);
                }
                debug!(context = %thread_name, "Consumer context stopped");
            })
            .with_context(|| format!("Failed to spawn consumer thread {}", name))?;

        Ok(ConsumerQueue {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ConsumerHandle<S> {
        self.handle.clone()
    }

    /// Stop accepting mutations, drain what is queued, and join the thread.
    pub fn shutdown(&mut self) {
        self.handle.tx.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Consumer context panicked");
            }
        }
    }
}

impl<S: 'static> DispatchSink<S> for ConsumerQueue<S> {
    fn post(&self, mutation: Mutation<S>) -> bool {
        self.handle.post(mutation)
    }
}

impl<S> Drop for ConsumerQueue<S> {
    fn drop(&mut self) {
        self.handle.tx.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
