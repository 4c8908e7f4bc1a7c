//! Delegate execution context
//!
//! The delegate is an independently scheduled context that owns the
//! consumer end of every streamed download. A producer registers a URL
//! together with the response headers and a consumer endpoint, then
//! navigates to that URL. Navigation drains the endpoint into the save
//! target, granting one credit per chunk, and ends with a
//! [`DeliveryReport`].

use crate::config::TransferConfig;
use crate::headers::{decode_filename, ResponseHeaders};
use crate::host::SaveTarget;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use core_types::{FsError, FsResult};
use ipc::{ConsumerEndpoint, ProducerEvent};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A download the delegate should serve when its URL is navigated to
pub struct Registration {
    pub url: String,
    pub headers: ResponseHeaders,
    pub endpoint: ConsumerEndpoint,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("channel", &self.endpoint.id())
            .finish()
    }
}

/// Messages accepted by the delegate context
#[derive(Debug)]
pub enum DelegateMessage {
    Register(Registration),
    Navigate { url: String },
    KeepAlive,
    Shutdown,
}

/// Final outcome of one streamed download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DeliveryReport {
    Completed {
        file_name: String,
        bytes: u64,
        /// Lowercase hex SHA-256 of the delivered bytes
        sha256: String,
    },
    Aborted {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

/// Sending handle to a delegate context
#[derive(Debug, Clone)]
pub struct DelegatePort {
    scope: String,
    sender: Sender<DelegateMessage>,
}

impl DelegatePort {
    /// URL prefix served by the delegate
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn register(&self, registration: Registration) -> FsResult<()> {
        self.send(DelegateMessage::Register(registration))
    }

    pub fn navigate(&self, url: impl Into<String>) -> FsResult<()> {
        self.send(DelegateMessage::Navigate { url: url.into() })
    }

    pub fn keep_alive(&self) -> FsResult<()> {
        self.send(DelegateMessage::KeepAlive)
    }

    fn send(&self, message: DelegateMessage) -> FsResult<()> {
        self.sender.send(message).map_err(|_| FsError::EndpointGone)
    }
}

/// Running delegate context
pub struct DelegateContext {
    port: DelegatePort,
    reports: Receiver<DeliveryReport>,
    keep_alives: Arc<AtomicU64>,
    join: Option<thread::JoinHandle<()>>,
}

impl DelegateContext {
    /// Starts the delegate serving URLs under the configured scope
    pub fn from_config(config: &TransferConfig, target: Arc<dyn SaveTarget>) -> io::Result<Self> {
        Self::spawn(config.scope.as_str(), target)
    }

    /// Starts the delegate on its own thread, serving URLs under `scope`
    pub fn spawn(scope: impl Into<String>, target: Arc<dyn SaveTarget>) -> io::Result<Self> {
        let scope = scope.into();
        let (sender, inbox) = unbounded();
        let (report_tx, reports) = unbounded();
        let keep_alives = Arc::new(AtomicU64::new(0));

        let worker = DelegateWorker {
            scope: scope.clone(),
            target,
            reports: report_tx,
            keep_alives: Arc::clone(&keep_alives),
            registrations: HashMap::new(),
        };
        let join = thread::Builder::new()
            .name("transfer-delegate".to_string())
            .spawn(move || worker.run(inbox))?;
        info!("event=delegate_start scope={}", scope);

        Ok(Self {
            port: DelegatePort { scope, sender },
            reports,
            keep_alives,
            join: Some(join),
        })
    }

    pub fn port(&self) -> DelegatePort {
        self.port.clone()
    }

    pub fn reports(&self) -> &Receiver<DeliveryReport> {
        &self.reports
    }

    /// Waits up to `timeout` for the next delivery report
    pub fn next_report(&self, timeout: Duration) -> Option<DeliveryReport> {
        match self.reports.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of keep-alive signals received so far
    pub fn keep_alives_received(&self) -> u64 {
        self.keep_alives.load(Ordering::Relaxed)
    }

    /// Stops accepting messages. Downloads already being served run to
    /// completion on their own threads.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = self.port.sender.send(DelegateMessage::Shutdown);
            let _ = handle.join();
            info!("event=delegate_stop scope={}", self.port.scope);
        }
    }
}

impl Drop for DelegateContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct DelegateWorker {
    scope: String,
    target: Arc<dyn SaveTarget>,
    reports: Sender<DeliveryReport>,
    keep_alives: Arc<AtomicU64>,
    registrations: HashMap<String, Registration>,
}

impl DelegateWorker {
    fn run(mut self, inbox: Receiver<DelegateMessage>) {
        while let Ok(message) = inbox.recv() {
            match message {
                DelegateMessage::Register(registration) => {
                    debug!(
                        "event=delegate_register url={} channel={}",
                        registration.url,
                        registration.endpoint.id()
                    );
                    self.registrations
                        .insert(registration.url.clone(), registration);
                }
                DelegateMessage::Navigate { url } => self.navigate(&url),
                DelegateMessage::KeepAlive => {
                    let count = self.keep_alives.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("event=delegate_keep_alive count={}", count);
                }
                DelegateMessage::Shutdown => break,
            }
        }
    }

    fn navigate(&mut self, url: &str) {
        let Some(registration) = self.registrations.remove(url) else {
            warn!("event=delegate_unknown_url url={}", url);
            let _ = self.reports.send(DeliveryReport::Failed {
                reason: format!("no download registered for {}", url),
            });
            return;
        };

        let file_name = url
            .strip_prefix(self.scope.as_str())
            .and_then(decode_filename);
        let Some(file_name) = file_name else {
            warn!("event=delegate_bad_url url={}", url);
            let _ = registration.endpoint.error("invalid download url");
            let _ = self.reports.send(DeliveryReport::Failed {
                reason: format!("invalid download url {}", url),
            });
            return;
        };

        let target = Arc::clone(&self.target);
        let reports = self.reports.clone();
        thread::spawn(move || {
            let report = serve(registration, &file_name, target.as_ref());
            let _ = reports.send(report);
        });
    }
}

/// Drains one registration into the save target
fn serve(registration: Registration, file_name: &str, target: &dyn SaveTarget) -> DeliveryReport {
    let Registration {
        url,
        headers,
        endpoint,
    } = registration;
    let channel = endpoint.id();

    let mut out = match target.create(file_name) {
        Ok(out) => out,
        Err(err) => {
            warn!(
                "event=delegate_save_failed channel={} file={} error={}",
                channel, file_name, err
            );
            let reason = err.to_string();
            let _ = endpoint.error(reason.clone());
            return DeliveryReport::Failed { reason };
        }
    };
    info!(
        "event=delegate_serve channel={} url={} content_type={} declared_length={:?}",
        channel, url, headers.content_type, headers.content_length
    );

    let mut hasher = Sha256::new();
    let mut bytes = 0u64;
    // A failed grant means the producer already hung up; its CLOSE or
    // ABORT may still be queued, so keep receiving.
    let _ = endpoint.pull();

    loop {
        match endpoint.recv() {
            Ok(ProducerEvent::Chunk(chunk)) => {
                if let Err(err) = out.write_all(&chunk) {
                    warn!(
                        "event=delegate_write_failed channel={} file={} error={}",
                        channel, file_name, err
                    );
                    let reason = err.to_string();
                    let _ = endpoint.error(reason.clone());
                    drop(out);
                    discard(target, file_name);
                    return DeliveryReport::Failed { reason };
                }
                hasher.update(&chunk);
                bytes += chunk.len() as u64;
                let _ = endpoint.pull();
            }
            Ok(ProducerEvent::Closed) => {
                if let Err(err) = out.flush() {
                    drop(out);
                    discard(target, file_name);
                    return DeliveryReport::Failed {
                        reason: err.to_string(),
                    };
                }
                if let Some(declared) = headers.content_length {
                    if declared != bytes {
                        warn!(
                            "event=delegate_length_mismatch channel={} declared={} actual={}",
                            channel, declared, bytes
                        );
                    }
                }
                let sha256 = format!("{:x}", hasher.finalize());
                info!(
                    "event=delivery_completed channel={} file={} bytes={}",
                    channel, file_name, bytes
                );
                return DeliveryReport::Completed {
                    file_name: file_name.to_string(),
                    bytes,
                    sha256,
                };
            }
            Ok(ProducerEvent::Aborted(reason)) => {
                warn!(
                    "event=delivery_aborted channel={} file={} reason={}",
                    channel, file_name, reason
                );
                drop(out);
                discard(target, file_name);
                return DeliveryReport::Aborted { reason };
            }
            Err(err) => {
                warn!(
                    "event=delivery_failed channel={} file={} error={}",
                    channel, file_name, err
                );
                drop(out);
                discard(target, file_name);
                return DeliveryReport::Failed {
                    reason: err.to_string(),
                };
            }
        }
    }
}

fn discard(target: &dyn SaveTarget, file_name: &str) {
    if let Err(err) = target.discard(file_name) {
        warn!("event=delegate_discard_failed file={} error={}", file_name, err);
    }
}
