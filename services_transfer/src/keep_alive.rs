//! Periodic keep-alive for the delegate context
//!
//! Runs for as long as a streamed download is in progress so the host does
//! not reclaim an idle delegate mid-transfer. Dropping or cancelling the
//! handle stops the ticker.

use crate::delegate::DelegatePort;
use crossbeam::channel::{bounded, tick, Sender};
use log::debug;
use std::thread;
use std::time::Duration;

/// Handle to a running keep-alive ticker
pub struct KeepAlive {
    stop: Option<Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl KeepAlive {
    /// Sends a keep-alive to `port` every `interval` until cancelled.
    ///
    /// The ticker also stops on its own once the delegate is gone.
    pub fn spawn(port: DelegatePort, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let join = thread::spawn(move || {
            let ticker = tick(interval);
            loop {
                crossbeam::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if port.keep_alive().is_err() {
                            debug!("event=keep_alive_delegate_gone");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            stop: Some(stop_tx),
            join: Some(join),
        }
    }

    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Stops the ticker and waits for its thread
    pub fn cancel(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop.take();
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.cancel();
    }
}
