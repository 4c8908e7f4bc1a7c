//! Host environment seen by the transfer service
//!
//! The embedding layer describes the host once: which engine it runs on,
//! whether a delegate context is reachable, where saved files land, and
//! the table of ephemeral object URLs used by buffered downloads.

use crate::delegate::DelegatePort;
use byte_store::ByteStore;
use core_types::{FsError, FsResult};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Destination of saved downloads (the host's native save action)
pub trait SaveTarget: Send + Sync {
    /// Opens a fresh destination for `file_name`, replacing any previous one
    fn create(&self, file_name: &str) -> io::Result<Box<dyn Write + Send>>;

    /// Removes a partially written destination
    fn discard(&self, file_name: &str) -> io::Result<()>;
}

/// Saves downloads as files in one directory
#[derive(Debug, Clone)]
pub struct DirectorySaveTarget {
    dir: PathBuf,
}

impl DirectorySaveTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves `file_name` inside the directory.
    ///
    /// Names that could escape the directory are refused.
    pub fn path_for(&self, file_name: &str) -> io::Result<PathBuf> {
        let escapes = file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\', '\0']);
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to save under name '{}'", file_name),
            ));
        }
        Ok(self.dir.join(file_name))
    }
}

impl SaveTarget for DirectorySaveTarget {
    fn create(&self, file_name: &str) -> io::Result<Box<dyn Write + Send>> {
        let path = self.path_for(file_name)?;
        let file = File::create(&path)?;
        debug!("event=save_target_create path={}", path.display());
        Ok(Box::new(BufWriter::new(file)))
    }

    fn discard(&self, file_name: &str) -> io::Result<()> {
        let path = self.path_for(file_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Content registered under an object URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub content: ByteStore,
    pub content_type: String,
}

/// Ephemeral `blob:` URLs pointing at in-memory content
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    entries: Arc<Mutex<HashMap<String, ObjectEntry>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `content` and returns its URL
    pub fn create(&self, content: ByteStore, content_type: &str) -> String {
        let url = format!("blob:{}", Uuid::new_v4());
        self.entries.lock().insert(
            url.clone(),
            ObjectEntry {
                content,
                content_type: content_type.to_string(),
            },
        );
        url
    }

    pub fn resolve(&self, url: &str) -> Option<ObjectEntry> {
        self.entries.lock().get(url).cloned()
    }

    /// Releases `url`. Returns false if it was not registered.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    /// Releases `url` after `delay` on a background thread
    pub fn revoke_after(&self, url: String, delay: Duration) -> thread::JoinHandle<()> {
        let registry = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            if registry.revoke(&url) {
                debug!("event=object_url_revoked url={}", url);
            } else {
                warn!("event=object_url_revoke_missing url={}", url);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Capabilities of the host, injected once into the orchestrator
#[derive(Clone)]
pub struct HostEnvironment {
    engine: String,
    delegate: Option<DelegatePort>,
    object_urls: ObjectUrlRegistry,
    save_target: Arc<dyn SaveTarget>,
}

impl HostEnvironment {
    /// Creates a host without a delegate context
    pub fn new(engine: impl Into<String>, save_target: Arc<dyn SaveTarget>) -> Self {
        Self {
            engine: engine.into(),
            delegate: None,
            object_urls: ObjectUrlRegistry::new(),
            save_target,
        }
    }

    pub fn with_delegate(mut self, port: DelegatePort) -> Self {
        self.delegate = Some(port);
        self
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn delegate(&self) -> Option<&DelegatePort> {
        self.delegate.as_ref()
    }

    pub fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.object_urls
    }

    pub fn save_target(&self) -> &Arc<dyn SaveTarget> {
        &self.save_target
    }

    /// Follows a download link to an object URL: saves its content under
    /// `file_name` and returns the number of bytes written.
    pub fn follow_download_link(&self, url: &str, file_name: &str) -> FsResult<u64> {
        let entry = self.object_urls.resolve(url).ok_or(FsError::NotFound)?;
        let write = || -> io::Result<()> {
            let mut out = self.save_target.create(file_name)?;
            for segment in entry.content.segments() {
                out.write_all(segment)?;
            }
            out.flush()
        };
        write().map_err(|err| {
            warn!(
                "event=download_link_failed url={} file={} error={}",
                url, file_name, err
            );
            FsError::aborted(err.to_string())
        })?;

        let size = entry.content.len() as u64;
        info!(
            "event=download_link_saved file={} bytes={} content_type={}",
            file_name, size, entry.content_type
        );
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_lifecycle() {
        let registry = ObjectUrlRegistry::new();
        let url = registry.create(ByteStore::from("blob body"), "text/plain");
        assert!(url.starts_with("blob:"));
        assert_eq!(registry.resolve(&url).unwrap().content, &b"blob body"[..]);

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
    }

    #[test]
    fn test_revoke_after_delay() {
        let registry = ObjectUrlRegistry::new();
        let url = registry.create(ByteStore::from("x"), "text/plain");
        let handle = registry.revoke_after(url.clone(), Duration::from_millis(20));
        assert!(registry.resolve(&url).is_some());
        handle.join().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_directory_target_refuses_escaping_names() {
        let target = DirectorySaveTarget::new("/tmp/downloads");
        for name in ["", ".", "..", "a/b", "..\\x"] {
            assert!(target.path_for(name).is_err(), "{name:?}");
        }
        assert_eq!(
            target.path_for("ok.txt").unwrap(),
            PathBuf::from("/tmp/downloads/ok.txt")
        );
    }

    #[test]
    fn test_follow_unknown_link_is_not_found() {
        let target = Arc::new(DirectorySaveTarget::new("/nonexistent"));
        let host = HostEnvironment::new("firefox", target);
        assert_eq!(
            host.follow_download_link("blob:missing", "a.txt").unwrap_err(),
            FsError::NotFound
        );
    }
}
