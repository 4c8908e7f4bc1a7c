//! Download sinks
//!
//! [`BufferedSink`] collects everything and hands the result to the host in
//! one piece on close. [`StreamingSink`] forwards each chunk across a
//! credit-based channel to the delegate as it is written.

use crate::host::HostEnvironment;
use crate::keep_alive::KeepAlive;
use crate::normalize::{download_payload, normalize};
use byte_store::ByteStore;
use core_types::{FsError, FsResult};
use ipc::{CreditWait, ProducerEndpoint};
use log::{debug, info, warn};
use services_storage::{Sink, WriteChunk};
use std::time::Duration;

const SINK_CLOSED_MESSAGE: &str = "Cannot write to a CLOSED writable stream";
const UNACKNOWLEDGED_REASON: &str = "chunk was sent but its credit grant never arrived";

/// Accumulates chunks in memory and saves them through an object URL
pub struct BufferedSink {
    file_name: String,
    content_type: String,
    release_delay: Duration,
    host: HostEnvironment,
    chunks: Vec<ByteStore>,
    finished: bool,
}

impl BufferedSink {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        release_delay: Duration,
        host: HostEnvironment,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            release_delay,
            host,
            chunks: Vec::new(),
            finished: false,
        }
    }

    /// Bytes accumulated so far
    pub fn buffered_len(&self) -> usize {
        self.chunks.iter().map(ByteStore::len).sum()
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.finished {
            Err(FsError::invalid_state(SINK_CLOSED_MESSAGE))
        } else {
            Ok(())
        }
    }
}

impl Sink for BufferedSink {
    fn write(&mut self, chunk: WriteChunk) -> FsResult<()> {
        self.ensure_open()?;
        let data = download_payload(chunk)?;
        self.chunks.push(data.into_store());
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        self.ensure_open()?;
        self.finished = true;

        let content = ByteStore::concat(std::mem::take(&mut self.chunks));
        let urls = self.host.object_urls();
        let url = urls.create(content, &self.content_type);
        let saved = self.host.follow_download_link(&url, &self.file_name);
        urls.revoke_after(url, self.release_delay);

        let bytes = saved?;
        info!(
            "event=buffered_download_complete file={} bytes={}",
            self.file_name, bytes
        );
        Ok(())
    }

    fn abort(&mut self, reason: &str) -> FsResult<()> {
        self.ensure_open()?;
        self.finished = true;
        self.chunks.clear();
        warn!(
            "event=buffered_download_aborted file={} reason={}",
            self.file_name, reason
        );
        Ok(())
    }
}

/// Forwards chunks to the delegate under single-credit flow control
pub struct StreamingSink {
    file_name: String,
    producer: ProducerEndpoint,
    keep_alive: Option<KeepAlive>,
    credit_timeout: Option<Duration>,
    started: bool,
    finished: bool,
}

impl StreamingSink {
    /// Wraps an endpoint whose consumer end is already registered with the
    /// delegate. The keep-alive is cancelled when the sink finishes.
    pub fn new(
        file_name: impl Into<String>,
        producer: ProducerEndpoint,
        keep_alive: Option<KeepAlive>,
        credit_timeout: Option<Duration>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            producer,
            keep_alive,
            credit_timeout,
            started: false,
            finished: false,
        }
    }

    pub fn producer(&self) -> &ProducerEndpoint {
        &self.producer
    }

    fn await_credit(wait: CreditWait<'_>, timeout: Option<Duration>) -> FsResult<()> {
        match timeout {
            Some(timeout) => wait.wait_timeout(timeout),
            None => wait.wait(),
        }
    }

    fn send(&mut self, chunk: WriteChunk) -> FsResult<()> {
        let data = download_payload(chunk)?;
        if !self.started {
            Self::await_credit(self.producer.start(), self.credit_timeout)?;
            self.started = true;
        }
        for piece in normalize(data) {
            let len = piece.len();
            let wait = self.producer.write(piece)?;
            if let Err(err) = Self::await_credit(wait, self.credit_timeout) {
                // The chunk is already with the consumer; resending it on a
                // retry would deliver it twice.
                self.producer.abort(UNACKNOWLEDGED_REASON);
                return Err(err);
            }
            debug!(
                "event=streaming_chunk_acked file={} bytes={}",
                self.file_name, len
            );
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(mut keep_alive) = self.keep_alive.take() {
            keep_alive.cancel();
        }
    }
}

impl Sink for StreamingSink {
    fn write(&mut self, chunk: WriteChunk) -> FsResult<()> {
        if self.finished {
            return Err(FsError::invalid_state(SINK_CLOSED_MESSAGE));
        }
        let result = self.send(chunk);
        if let Err(err) = &result {
            // Consumer failures end the transfer; rejected commands do not.
            if self.producer.state().is_terminal() {
                warn!(
                    "event=streaming_download_failed file={} error={}",
                    self.file_name, err
                );
                self.finish();
            }
        }
        result
    }

    fn close(&mut self) -> FsResult<()> {
        if self.finished {
            return Err(FsError::invalid_state(SINK_CLOSED_MESSAGE));
        }
        let result = self.producer.close();
        self.finish();
        if result.is_ok() {
            info!(
                "event=streaming_download_closed file={} chunks={}",
                self.file_name,
                self.producer.chunks_sent()
            );
        }
        result
    }

    fn abort(&mut self, reason: &str) -> FsResult<()> {
        if self.finished {
            return Err(FsError::invalid_state(SINK_CLOSED_MESSAGE));
        }
        self.producer.abort(reason);
        self.finish();
        Ok(())
    }
}

impl Drop for StreamingSink {
    fn drop(&mut self) {
        if !self.finished {
            self.producer.abort("sink dropped without close");
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DirectorySaveTarget;
    use core_types::ErrorKind;
    use ipc::ProducerEvent;
    use services_storage::WriteCommand;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_silent_consumer_times_out_with_credit_timeout() {
        let (producer, consumer) = ipc::channel();
        let timeout = Some(Duration::from_millis(20));
        let mut sink = StreamingSink::new("slow.bin", producer, None, timeout);

        let err = sink.write("never granted".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(consumer.try_recv().unwrap(), None);

        // The sink is still open; a later grant lets the write through
        consumer.pull().unwrap();
        let reader = thread::spawn(move || {
            let event = consumer.recv().unwrap();
            consumer.pull().unwrap();
            (event, consumer)
        });
        sink.write("granted".into()).unwrap();
        let (event, _consumer) = reader.join().unwrap();
        assert_eq!(event, ProducerEvent::Chunk(bytes::Bytes::from_static(b"granted")));
    }

    #[test]
    fn test_missing_grant_after_send_finishes_the_transfer() {
        let (producer, consumer) = ipc::channel();
        let timeout = Some(Duration::from_millis(30));
        let mut sink = StreamingSink::new("slow.bin", producer, None, timeout);
        consumer.pull().unwrap();

        let err = sink.write("A".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(sink.producer().state().is_terminal());
        assert!(matches!(sink.write("A".into()), Err(FsError::InvalidState(_))));
        assert!(sink.close().is_err());

        let mut delivered = Vec::new();
        let outcome = loop {
            match consumer.recv().unwrap() {
                ProducerEvent::Chunk(chunk) => delivered.extend_from_slice(&chunk),
                other => break other,
            }
        };
        assert_eq!(delivered, b"A");
        assert_eq!(outcome, ProducerEvent::Aborted(UNACKNOWLEDGED_REASON.to_string()));
    }

    #[test]
    fn test_streaming_rejects_commands_without_finishing() {
        let (producer, _consumer) = ipc::channel();
        let mut sink = StreamingSink::new("a", producer, None, None);
        let err = sink.write(WriteCommand::truncate(1).into()).unwrap_err();
        assert_eq!(err, FsError::InvalidModification);
        assert!(!sink.producer().state().is_terminal());
        sink.abort("done").unwrap();
        assert!(sink.close().is_err());
    }

    #[test]
    fn test_dropping_streaming_sink_aborts_channel() {
        let (producer, consumer) = ipc::channel();
        drop(StreamingSink::new("a", producer, None, None));
        assert_eq!(
            consumer.recv().unwrap(),
            ProducerEvent::Aborted("sink dropped without close".to_string())
        );
    }

    #[test]
    fn test_buffered_abort_discards_chunks() {
        let target = Arc::new(DirectorySaveTarget::new("/nonexistent"));
        let host = HostEnvironment::new("safari", target);
        let delay = Duration::from_millis(1);
        let mut sink = BufferedSink::new("a.txt", "text/plain", delay, host.clone());
        sink.write("abc".into()).unwrap();
        sink.write(vec![1u8, 2].into()).unwrap();
        assert_eq!(sink.buffered_len(), 5);

        sink.abort("cancel").unwrap();
        assert_eq!(sink.buffered_len(), 0);
        assert!(host.object_urls().is_empty());
        assert!(matches!(sink.write("late".into()), Err(FsError::InvalidState(_))));
    }
}
