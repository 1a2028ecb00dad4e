//! Delivery of results onto the thread that owns the display.
//!
//! Fetches complete on runtime workers. A front end that is single-threaded
//! keeps a [`Mailbox`] on its own thread and hands [`Postman`]s to the
//! orchestrator callbacks, so every callback body runs where the display lives.

use std::sync::mpsc;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct Postman {
    tx: mpsc::Sender<Job>,
}

pub struct Mailbox {
    rx: mpsc::Receiver<Job>,
}

pub fn mailbox() -> (Postman, Mailbox) {
    let (tx, rx) = mpsc::channel();
    (Postman { tx }, Mailbox { rx })
}

impl Postman {
    /// Queues `job` for the mailbox thread. False once the mailbox is gone.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Wraps a callback so that calling it from any thread only queues it.
    pub fn deliver<T, C>(&self, callback: C) -> impl FnOnce(T) + Send + 'static
    where
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let postman = self.clone();
        move |value: T| {
            if !postman.post(move || callback(value)) {
                log::debug!("Mailbox closed; dropping delivery");
            }
        }
    }
}

impl Mailbox {
    /// Runs everything already queued without blocking.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for the first job, then drains the queue.
    pub fn run_for(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                1 + self.run_pending()
            }
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn deliveries_run_on_the_mailbox_thread() {
        let (postman, mailbox) = mailbox();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let owner = thread::current().id();

        let sink = Arc::clone(&seen);
        let callback = postman.deliver(move |value: u32| {
            assert_eq!(thread::current().id(), owner);
            sink.lock().unwrap().push(value);
        });
        thread::spawn(move || callback(7)).join().unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(mailbox.run_for(Duration::from_secs(1)), 1);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn empty_mailbox_times_out() {
        let (_postman, mailbox) = mailbox();
        assert_eq!(mailbox.run_pending(), 0);
        assert_eq!(mailbox.run_for(Duration::from_millis(10)), 0);
    }

    #[test]
    fn posting_after_close_reports_failure() {
        let (postman, mailbox) = mailbox();
        drop(mailbox);
        assert!(!postman.post(|| {}));
    }
}
