//! Trailing-edge debouncer on a dedicated timer thread.
//!
//! `notify()` (re)arms the timer; if `delay` passes without another
//! `notify()`, the trigger runs exactly once on the timer thread. `stop()`
//! disarms without firing.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

enum TimerCommand {
    Notify,
    Stop,
    Shutdown,
}

pub struct Debouncer {
    tx: Sender<TimerCommand>,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new<F>(delay: Duration, on_trigger: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let timer = thread::Builder::new()
            .name("history-debounce".to_string())
            .spawn(move || {
                let mut deadline: Option<Instant> = None;
                loop {
                    let command = match deadline {
                        None => match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        },
                        Some(at) => {
                            let wait = at.saturating_duration_since(Instant::now());
                            match rx.recv_timeout(wait) {
                                Ok(command) => command,
                                Err(RecvTimeoutError::Timeout) => {
                                    deadline = None;
                                    trace!("Debounce window elapsed, triggering");
                                    on_trigger();
                                    continue;
                                }
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                    };

                    match command {
                        TimerCommand::Notify => deadline = Some(Instant::now() + delay),
                        TimerCommand::Stop => deadline = None,
                        TimerCommand::Shutdown => break,
                    }
                }
                debug!("Debounce timer exiting");
            })
            .context("Failed to spawn debounce timer thread")?;

        Ok(Debouncer {
            tx,
            timer: Some(timer),
        })
    }

    /// Re-arm the timer, timed from this call
    pub fn notify(&self) {
        let _ = self.tx.send(TimerCommand::Notify);
    }

    /// Disarm any pending trigger without firing it
    pub fn stop(&self) {
        let _ = self.tx.send(TimerCommand::Stop);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.timer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(delay_ms: u64) -> (Debouncer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let debouncer = Debouncer::new(Duration::from_millis(delay_ms), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (debouncer, fired)
    }

    #[test]
    fn test_burst_fires_once() {
        let (debouncer, fired) = counting(80);
        for _ in 0..10 {
            debouncer.notify();
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trigger_is_timed_from_last_notify() {
        let (debouncer, fired) = counting(150);
        debouncer.notify();
        thread::sleep(Duration::from_millis(100));
        debouncer.notify();
        thread::sleep(Duration::from_millis(100));
        // 200ms after the first notify, only 100ms after the last
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_separate_bursts_fire_separately() {
        let (debouncer, fired) = counting(40);
        debouncer.notify();
        thread::sleep(Duration::from_millis(200));
        debouncer.notify();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_disarms() {
        let (debouncer, fired) = counting(60);
        debouncer.notify();
        debouncer.stop();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_without_notify_does_not_fire() {
        let (debouncer, fired) = counting(10);
        drop(debouncer);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
