//! Delivery strategy selection
//!
//! The strategy is picked once, when the orchestrator is built, from the
//! injected [`HostEnvironment`]. Opening a download afterwards only wires
//! up the sink for that strategy.

use crate::config::TransferConfig;
use crate::delegate::Registration;
use crate::headers::{encode_filename, ResponseHeaders};
use crate::host::HostEnvironment;
use crate::keep_alive::KeepAlive;
use crate::sink::{BufferedSink, StreamingSink};
use core_types::{FsError, FsResult};
use log::info;
use serde::{Deserialize, Serialize};
use services_storage::Sink;
use std::fmt;

/// How written bytes reach the host's save action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStrategy {
    /// Collect in memory, save once on close
    Buffered,
    /// Stream through the delegate context under backpressure
    Streaming,
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStrategy::Buffered => write!(f, "buffered"),
            TransferStrategy::Streaming => write!(f, "streaming"),
        }
    }
}

/// Chooses the strategy for a host.
///
/// Streaming needs a delegate and an engine that is not on the quirks list.
/// Declared sizes play no part.
pub fn select_strategy(config: &TransferConfig, host: &HostEnvironment) -> TransferStrategy {
    if host.delegate().is_none() || config.is_quirky(host.engine()) {
        TransferStrategy::Buffered
    } else {
        TransferStrategy::Streaming
    }
}

/// Opens download sinks with the strategy chosen for the host
pub struct TransferOrchestrator {
    config: TransferConfig,
    host: HostEnvironment,
    strategy: TransferStrategy,
}

impl TransferOrchestrator {
    pub fn new(config: TransferConfig, host: HostEnvironment) -> Self {
        let strategy = select_strategy(&config, &host);
        info!(
            "event=transfer_strategy_selected engine={} delegate={} strategy={}",
            host.engine(),
            host.delegate().is_some(),
            strategy
        );
        Self {
            config,
            host,
            strategy,
        }
    }

    pub fn strategy(&self) -> TransferStrategy {
        self.strategy
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn host(&self) -> &HostEnvironment {
        &self.host
    }

    /// Starts a download of `file_name`. `size` is the declared total, if
    /// known; it is only announced, never enforced.
    pub fn open(&self, file_name: &str, size: Option<u64>) -> FsResult<Box<dyn Sink>> {
        match self.strategy {
            TransferStrategy::Buffered => Ok(Box::new(BufferedSink::new(
                file_name,
                self.config.content_type.as_str(),
                self.config.release_delay(),
                self.host.clone(),
            ))),
            TransferStrategy::Streaming => self.open_streaming(file_name, size),
        }
    }

    fn open_streaming(&self, file_name: &str, size: Option<u64>) -> FsResult<Box<dyn Sink>> {
        let port = self
            .host
            .delegate()
            .ok_or_else(|| FsError::invalid_state("no delegate context available"))?;

        let (producer, consumer) = ipc::channel();
        let url = format!("{}{}", port.scope(), encode_filename(file_name));
        let headers = ResponseHeaders::attachment(file_name, &self.config.content_type, size);

        port.register(Registration {
            url: url.clone(),
            headers,
            endpoint: consumer,
        })?;
        let keep_alive = KeepAlive::spawn(port.clone(), self.config.keep_alive_interval());
        port.navigate(url.as_str())?;

        info!(
            "event=streaming_download_open file={} url={} channel={}",
            file_name,
            url,
            producer.id()
        );
        Ok(Box::new(StreamingSink::new(
            file_name,
            producer,
            Some(keep_alive),
            self.config.credit_timeout(),
        )))
    }
}
