//! File-backed credential store.
//!
//! The namespace is kept as a single JSON object on disk. Writes go through a
//! temp file and a rename so readers in other processes never observe a
//! half-written file, and the file is created owner-only. When watching is
//! enabled, a `notify` watcher on the parent directory re-reads the file after
//! every external change and publishes a [`StoreEvent`] for each slot whose
//! credential differs from the last snapshot.

// Author: kelexine (https://github.com/kelexine)

use super::{
    read_credential, read_last_logged_in, remove_credential, write_credential, CredentialStore,
    Namespace, StoreEvent, EVENT_CHANNEL_CAPACITY, LAST_LOGGED_IN_KEY,
};
use crate::error::{BlendError, Result};
use crate::oauth::{Credential, Slot};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Last state seen on disk.
struct Snapshot {
    /// Indexed by [`Slot::index`].
    credentials: [Credential; 2],
    last_logged_in: Option<Slot>,
}

impl Snapshot {
    fn read(namespace: &Namespace) -> Self {
        Self {
            credentials: [
                read_credential(namespace, Slot::A),
                read_credential(namespace, Slot::B),
            ],
            last_logged_in: read_last_logged_in(namespace),
        }
    }
}

pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
    snapshot: Arc<Mutex<Snapshot>>,
    events: broadcast::Sender<StoreEvent>,
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path` without watching for
    /// changes made by other processes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(path.as_ref(), false)
    }

    /// Opens the store and starts a filesystem watcher so that writes from other
    /// processes are published to subscribers.
    pub fn open_watched(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    fn build(path: &Path, watch: bool) -> Result<Self> {
        let path = path.to_path_buf();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).map_err(|e| {
            BlendError::Store(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;

        let namespace = load_namespace(&path)?;
        let snapshot = Arc::new(Mutex::new(Snapshot::read(&namespace)));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let watcher = if watch {
            Some(Self::spawn_watcher(&dir, &path, &snapshot, &events)?)
        } else {
            None
        };

        debug!("Opened credential store at {}", path.display());

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            snapshot,
            events,
            _watcher: Mutex::new(watcher),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spawn_watcher(
        dir: &Path,
        path: &Path,
        snapshot: &Arc<Mutex<Snapshot>>,
        events: &broadcast::Sender<StoreEvent>,
    ) -> Result<RecommendedWatcher> {
        let path_clone = path.to_path_buf();
        let snapshot_clone = Arc::clone(snapshot);
        let sender_clone = events.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        Self::handle_file_event(&event, &path_clone, &snapshot_clone, &sender_clone)
                    }
                    Err(e) => error!("Credential store watch error: {}", e),
                }
            })
            .map_err(|e| BlendError::Store(format!("Failed to create store watcher: {}", e)))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| BlendError::Store(format!("Failed to watch {}: {}", dir.display(), e)))?;

        info!("Watching credential store {} for external changes", path.display());
        Ok(watcher)
    }

    fn handle_file_event(
        event: &Event,
        path: &Path,
        snapshot: &Mutex<Snapshot>,
        sender: &broadcast::Sender<StoreEvent>,
    ) {
        let is_our_file = event
            .paths
            .iter()
            .any(|p| p.file_name() == path.file_name());
        if !is_our_file {
            return;
        }

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                match load_namespace(path) {
                    Ok(namespace) => publish_changes(snapshot, sender, &namespace),
                    Err(e) => warn!("Ignoring unreadable credential store update: {}", e),
                }
            }
            _ => {}
        }
    }

    /// Runs one read-modify-write cycle. `apply` returns false to skip the write.
    fn update<F>(&self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Namespace) -> bool,
    {
        let _guard = self.write_lock.lock();
        let mut namespace = load_namespace(&self.path)?;
        if !apply(&mut namespace) {
            return Ok(false);
        }
        save_namespace(&self.path, &namespace)?;
        publish_changes(&self.snapshot, &self.events, &namespace);
        Ok(true)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, slot: Slot) -> Result<Credential> {
        Ok(read_credential(&load_namespace(&self.path)?, slot))
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        self.update(|ns| {
            write_credential(ns, credential);
            true
        })?;
        Ok(())
    }

    fn clear(&self, slot: Slot) -> Result<()> {
        self.update(|ns| {
            remove_credential(ns, slot);
            true
        })?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.update(|ns| {
            for slot in Slot::ALL {
                remove_credential(ns, slot);
            }
            ns.remove(LAST_LOGGED_IN_KEY);
            true
        })?;
        Ok(())
    }

    fn compare_and_swap(&self, expected: &Credential, new: Option<&Credential>) -> Result<bool> {
        self.update(|ns| {
            if read_credential(ns, expected.slot) != *expected {
                return false;
            }
            match new {
                Some(credential) => write_credential(ns, credential),
                None => remove_credential(ns, expected.slot),
            }
            true
        })
    }

    fn last_logged_in(&self) -> Result<Option<Slot>> {
        Ok(read_last_logged_in(&load_namespace(&self.path)?))
    }

    fn set_last_logged_in(&self, slot: Slot) -> Result<()> {
        self.update(|ns| {
            ns.insert(LAST_LOGGED_IN_KEY.to_string(), slot.to_string());
            true
        })?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Diff `namespace` against the snapshot and emit one event per changed slot.
/// A moved last-logged-in marker counts as a change of the slot it now names
/// (or named, when cleared).
fn publish_changes(
    snapshot: &Mutex<Snapshot>,
    sender: &broadcast::Sender<StoreEvent>,
    namespace: &Namespace,
) {
    let latest = Snapshot::read(namespace);
    let mut snapshot = snapshot.lock();
    let mut changed = [false; 2];

    for slot in Slot::ALL {
        if snapshot.credentials[slot.index()] != latest.credentials[slot.index()] {
            debug!("Credential for user {} changed", slot);
            changed[slot.index()] = true;
        }
    }
    if snapshot.last_logged_in != latest.last_logged_in {
        debug!("Last logged in user changed to {:?}", latest.last_logged_in);
        if let Some(slot) = latest.last_logged_in.or(snapshot.last_logged_in) {
            changed[slot.index()] = true;
        }
    }

    *snapshot = latest;
    for slot in Slot::ALL {
        if changed[slot.index()] {
            let _ = sender.send(StoreEvent::Changed(slot));
        }
    }
}

/// Read the namespace from disk. A missing or empty file is an empty namespace.
fn load_namespace(path: &Path) -> Result<Namespace> {
    if !path.exists() {
        return Ok(Namespace::new());
    }

    validate_permissions(path)?;

    let contents = fs::read_to_string(path)
        .map_err(|e| BlendError::Store(format!("Failed to read {}: {}", path.display(), e)))?;
    if contents.trim().is_empty() {
        return Ok(Namespace::new());
    }

    serde_json::from_str(&contents)
        .map_err(|e| BlendError::Store(format!("Invalid store JSON in {}: {}", path.display(), e)))
}

fn save_namespace(path: &Path, namespace: &Namespace) -> Result<()> {
    let json = serde_json::to_string_pretty(namespace)
        .map_err(|e| BlendError::Internal(format!("Serialization failure: {}", e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session.json".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path).map_err(|e| {
            BlendError::Store(format!("Failed to create {}: {}", tmp_path.display(), e))
        })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| BlendError::Store(format!("Disk write failure: {}", e)))?;
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| BlendError::Store(format!("Failed to replace {}: {}", path.display(), e)))
}

/// Refuses store files readable by group or others.
fn validate_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                "Insecure permissions on {}: {:o} (expected 0600)",
                path.display(),
                mode
            );
            return Err(BlendError::Store(format!(
                "Insecure file permissions: {:o}. Session files must be 0600 (rw-------).",
                mode
            )));
        }
    }

    Ok(())
}
