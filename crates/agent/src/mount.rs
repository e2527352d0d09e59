//! The SCSI mount manager: a concurrency-safe, reference-counted mount
//! registry (spec §4.4).
//!
//! Generalizes the teacher's single in-flight `Engine::judge` call into a
//! table of concurrently in-flight operations, deduplicated by key, the way
//! a request-coalescing cache collapses concurrent misses into one fetch.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MountOpError {
    #[error("mount path {path:?} is already in use by a different mount")]
    PathConflict { path: String },
    #[error("no mount is tracked at path {path:?}")]
    NotFound { path: String },
    #[error("underlying mount failed: {0}")]
    MountFailed(String),
    #[error("underlying unmount failed: {0}")]
    UnmountFailed(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// Value-typed mount configuration. Two configs are equal iff every field
/// matches after `options` is canonically sorted.
#[derive(Debug, Clone)]
pub struct MountConfig {
    pub partition: Option<u32>,
    pub read_only: bool,
    pub encrypted: bool,
    pub block_device: bool,
    pub options: Vec<String>,
    pub ensure_filesystem: bool,
    pub filesystem: Option<String>,
}

impl MountConfig {
    /// Builds a config, canonicalising `options` by sorting them so that
    /// key equality is insensitive to caller-supplied ordering.
    pub fn new(
        partition: Option<u32>,
        read_only: bool,
        encrypted: bool,
        block_device: bool,
        mut options: Vec<String>,
        ensure_filesystem: bool,
        filesystem: Option<String>,
    ) -> Self {
        options.sort();
        Self {
            partition,
            read_only,
            encrypted,
            block_device,
            options,
            ensure_filesystem,
            filesystem,
        }
    }
}

impl PartialEq for MountConfig {
    fn eq(&self, other: &Self) -> bool {
        self.partition == other.partition
            && self.read_only == other.read_only
            && self.encrypted == other.encrypted
            && self.block_device == other.block_device
            && self.ensure_filesystem == other.ensure_filesystem
            && self.filesystem == other.filesystem
            && self.options == other.options
    }
}
impl Eq for MountConfig {}

/// Narrow contract the mount manager calls to realise/tear down a mount.
/// Device drivers, virtio-9p mounts, and VPMEM/VPCI attaches are external
/// collaborators; this trait is their only seam into the core.
pub trait Mounter: Send + Sync {
    fn mount(
        &self,
        cancel: &CancellationToken,
        controller: u8,
        lun: u8,
        path: &str,
        config: &MountConfig,
    ) -> impl std::future::Future<Output = Result<(), MountOpError>> + Send;

    fn unmount(
        &self,
        cancel: &CancellationToken,
        controller: u8,
        lun: u8,
        path: &str,
        config: &MountConfig,
    ) -> impl std::future::Future<Output = Result<(), MountOpError>> + Send;
}

/// A single-shot, multi-subscriber completion: the pioneer publishes once,
/// every dedup'd subscriber observes the same outcome.
struct Readiness {
    notify: Notify,
    outcome: StdMutex<Option<Result<(), MountOpError>>>,
}

impl Readiness {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            outcome: StdMutex::new(None),
        }
    }

    fn publish(&self, result: Result<(), MountOpError>) {
        *self.outcome.lock().unwrap() = Some(result);
        self.notify.notify_waiters();
    }

    /// Awaits the outcome, resilient to the "check, then wait" race via the
    /// standard `Notify` pattern of registering interest before checking.
    async fn wait(&self) -> Result<(), MountOpError> {
        loop {
            let notified = self.notify.notified();
            if let Some(result) = self.outcome.lock().unwrap().clone() {
                return result;
            }
            notified.await;
        }
    }
}

struct MountSlot {
    path: String,
    controller: u8,
    lun: u8,
    config: MountConfig,
    ref_count: u64,
    readiness: Arc<Readiness>,
}

#[derive(Default)]
struct MountTable {
    /// Indexed by stable slot index; `None` is a tombstone available for reuse.
    slots: Vec<Option<MountSlot>>,
}

impl MountTable {
    fn find_key_equal_mut(&mut self, controller: u8, lun: u8, config: &MountConfig) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|s| s.controller == controller && s.lun == lun && &s.config == config)
        })
    }

    fn path_conflict(&self, path: &str, controller: u8, lun: u8, config: &MountConfig) -> bool {
        self.slots.iter().any(|slot| {
            slot.as_ref().is_some_and(|s| {
                s.path == path && (s.controller != controller || s.lun != lun || &s.config != config)
            })
        })
    }

    fn lowest_free_slot(&mut self) -> usize {
        match self.slots.iter().position(|s| s.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        }
    }

    fn find_by_path(&self, path: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.path == path))
    }
}

/// Reference-counted, deduplicated mount registry over a single `Mounter`.
pub struct MountManager<M: Mounter> {
    mounter: Arc<M>,
    mount_path_template: String,
    table: Mutex<MountTable>,
}

impl<M: Mounter> MountManager<M> {
    pub fn new(mounter: M, config: &Config) -> Self {
        Self {
            mounter: Arc::new(mounter),
            mount_path_template: config.mount_path_template.clone(),
            table: Mutex::new(MountTable::default()),
        }
    }

    fn render_path(&self, index: usize) -> String {
        self.mount_path_template.replace("{}", &index.to_string())
    }

    /// Mounts `(controller, lun)` with `config`, deduplicating against any
    /// in-flight or completed key-equal mount. Returns the assigned guest
    /// path.
    #[tracing::instrument(skip(self, cancel, config), fields(controller, lun))]
    pub async fn mount(
        &self,
        cancel: &CancellationToken,
        controller: u8,
        lun: u8,
        path: &str,
        config: MountConfig,
    ) -> Result<String, MountOpError> {
        enum Role {
            Pioneer { index: usize, assigned_path: String },
            Subscriber { readiness: Arc<Readiness>, assigned_path: String },
        }

        let role = {
            let mut table = self.table.lock().await;
            if let Some(index) = table.find_key_equal_mut(controller, lun, &config) {
                let slot = table.slots[index].as_mut().unwrap();
                slot.ref_count += 1;
                Role::Subscriber {
                    readiness: slot.readiness.clone(),
                    assigned_path: slot.path.clone(),
                }
            } else {
                if !path.is_empty() && table.path_conflict(path, controller, lun, &config) {
                    return Err(MountOpError::PathConflict { path: path.to_string() });
                }
                let index = table.lowest_free_slot();
                let assigned_path = if path.is_empty() {
                    self.render_path(index)
                } else {
                    path.to_string()
                };
                table.slots[index] = Some(MountSlot {
                    path: assigned_path.clone(),
                    controller,
                    lun,
                    config: config.clone(),
                    ref_count: 1,
                    readiness: Arc::new(Readiness::new()),
                });
                Role::Pioneer { index, assigned_path }
            }
        };

        match role {
            Role::Pioneer { index, assigned_path } => {
                let result = self.mounter.mount(cancel, controller, lun, &assigned_path, &config).await;
                let readiness = {
                    let mut table = self.table.lock().await;
                    match &result {
                        Ok(()) => table.slots[index].as_ref().unwrap().readiness.clone(),
                        Err(_) => {
                            // Failure atomicity: remove before publishing so
                            // subsequent callers never see a ghost entry.
                            let slot = table.slots[index].take().unwrap();
                            slot.readiness
                        }
                    }
                };
                readiness.publish(result.clone());
                result.map(|_| assigned_path)
            }
            Role::Subscriber { readiness, assigned_path } => {
                tokio::select! {
                    result = readiness.wait() => result.map(|_| assigned_path),
                    _ = cancel.cancelled() => {
                        let mut table = self.table.lock().await;
                        if let Some(index) = table.find_key_equal_mut(controller, lun, &config) {
                            if let Some(slot) = table.slots[index].as_mut() {
                                slot.ref_count = slot.ref_count.saturating_sub(1);
                            }
                        }
                        Err(MountOpError::Cancelled)
                    }
                }
            }
        }
    }

    /// Decrements the reference count for the entry owning `path`; on
    /// reaching zero, physically unmounts and frees the slot regardless of
    /// the outcome (see DESIGN.md for the open-question resolution).
    #[tracing::instrument(skip(self, cancel))]
    pub async fn unmount(&self, cancel: &CancellationToken, path: &str) -> Result<(), MountOpError> {
        let (index, controller, lun, config, last_ref) = {
            let mut table = self.table.lock().await;
            let index = table
                .find_by_path(path)
                .ok_or_else(|| MountOpError::NotFound { path: path.to_string() })?;
            let slot = table.slots[index].as_mut().unwrap();
            slot.ref_count = slot.ref_count.saturating_sub(1);
            (index, slot.controller, slot.lun, slot.config.clone(), slot.ref_count == 0)
        };

        if !last_ref {
            return Ok(());
        }

        let result = self.mounter.unmount(cancel, controller, lun, path, &config).await;
        let mut table = self.table.lock().await;
        table.slots[index] = None;
        result
    }

    /// Current reference count for the entry owning `path`, for tests and
    /// diagnostics.
    pub async fn ref_count(&self, path: &str) -> Option<u64> {
        let table = self.table.lock().await;
        table
            .find_by_path(path)
            .and_then(|i| table.slots[i].as_ref())
            .map(|s| s.ref_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingMounter {
        mount_calls: AtomicUsize,
        unmount_calls: AtomicUsize,
        fail_mount: bool,
    }

    impl CountingMounter {
        fn new() -> Self {
            Self {
                mount_calls: AtomicUsize::new(0),
                unmount_calls: AtomicUsize::new(0),
                fail_mount: false,
            }
        }
    }

    impl Mounter for CountingMounter {
        async fn mount(
            &self,
            _cancel: &CancellationToken,
            _controller: u8,
            _lun: u8,
            _path: &str,
            _config: &MountConfig,
        ) -> Result<(), MountOpError> {
            self.mount_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_mount {
                Err(MountOpError::MountFailed("injected failure".into()))
            } else {
                Ok(())
            }
        }

        async fn unmount(
            &self,
            _cancel: &CancellationToken,
            _controller: u8,
            _lun: u8,
            _path: &str,
            _config: &MountConfig,
        ) -> Result<(), MountOpError> {
            self.unmount_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            mount_path_template: "/mnt/scsi/{}".into(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn deduplicates_concurrent_key_equal_mounts() {
        let manager = Arc::new(MountManager::new(CountingMounter::new(), &test_config()));
        let cancel = CancellationToken::new();

        let cfg_a = MountConfig::new(None, true, false, false, vec!["noatime".into(), "ro".into()], false, None);
        let cfg_b = MountConfig::new(None, true, false, false, vec!["ro".into(), "noatime".into()], false, None);

        let (m1, m2) = tokio::join!(
            manager.mount(&cancel, 0, 3, "", cfg_a),
            manager.mount(&cancel, 0, 3, "", cfg_b),
        );

        let path_a = m1.unwrap();
        let path_b = m2.unwrap();
        assert_eq!(path_a, path_b);
        assert_eq!(path_a, "/mnt/scsi/0");
        assert_eq!(manager.mounter.mount_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.ref_count(&path_a).await, Some(2));
    }

    #[tokio::test]
    async fn reference_counting_releases_on_last_unmount() {
        let manager = MountManager::new(CountingMounter::new(), &test_config());
        let cancel = CancellationToken::new();
        let cfg = MountConfig::new(None, true, false, false, vec!["ro".into()], false, None);

        let path = manager.mount(&cancel, 0, 3, "", cfg.clone()).await.unwrap();
        manager.mount(&cancel, 0, 3, "", cfg).await.unwrap();
        assert_eq!(manager.ref_count(&path).await, Some(2));

        manager.unmount(&cancel, &path).await.unwrap();
        assert_eq!(manager.ref_count(&path).await, Some(1));
        assert_eq!(manager.mounter.unmount_calls.load(Ordering::SeqCst), 0);

        manager.unmount(&cancel, &path).await.unwrap();
        assert_eq!(manager.ref_count(&path).await, None);
        assert_eq!(manager.mounter.unmount_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_path_conflicts_without_mutating_the_table() {
        let manager = MountManager::new(CountingMounter::new(), &test_config());
        let cancel = CancellationToken::new();

        let cfg1 = MountConfig::new(None, false, false, false, vec![], false, None);
        manager.mount(&cancel, 0, 1, "/mnt/x", cfg1).await.unwrap();

        let cfg2 = MountConfig::new(None, true, false, false, vec![], false, None);
        let err = manager.mount(&cancel, 0, 2, "/mnt/x", cfg2).await.unwrap_err();
        assert!(matches!(err, MountOpError::PathConflict { .. }));
        assert_eq!(manager.ref_count("/mnt/x").await, Some(1));
    }

    #[tokio::test]
    async fn failed_mount_removes_the_entry_before_publishing() {
        let mounter = CountingMounter { fail_mount: true, ..CountingMounter::new() };
        let manager = MountManager::new(mounter, &test_config());
        let cancel = CancellationToken::new();
        let cfg = MountConfig::new(None, false, false, false, vec![], false, None);

        let err = manager.mount(&cancel, 0, 0, "", cfg).await.unwrap_err();
        assert!(matches!(err, MountOpError::MountFailed(_)));
        assert_eq!(manager.ref_count("/mnt/scsi/0").await, None);
    }

    #[tokio::test]
    async fn tombstoned_slot_is_reused_by_the_next_mount() {
        let manager = MountManager::new(CountingMounter::new(), &test_config());
        let cancel = CancellationToken::new();

        let cfg1 = MountConfig::new(None, false, false, false, vec![], false, None);
        let path1 = manager.mount(&cancel, 0, 1, "", cfg1).await.unwrap();
        assert_eq!(path1, "/mnt/scsi/0");
        manager.unmount(&cancel, &path1).await.unwrap();

        let cfg2 = MountConfig::new(None, false, false, false, vec![], false, None);
        let path2 = manager.mount(&cancel, 0, 2, "", cfg2).await.unwrap();
        assert_eq!(path2, "/mnt/scsi/0");
    }

    #[tokio::test]
    async fn cancelling_a_subscriber_rolls_back_only_its_own_reference() {
        let manager = Arc::new(MountManager::new(CountingMounter::new(), &test_config()));
        let pioneer_cancel = CancellationToken::new();
        let cfg = MountConfig::new(None, false, false, false, vec![], false, None);

        let pioneer = {
            let manager = manager.clone();
            let cfg = cfg.clone();
            tokio::spawn(async move { manager.mount(&pioneer_cancel, 0, 5, "", cfg).await })
        };
        // Give the pioneer a chance to claim the slot before the subscriber arrives.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let subscriber_cancel = CancellationToken::new();
        subscriber_cancel.cancel();
        let err = manager.mount(&subscriber_cancel, 0, 5, "", cfg).await.unwrap_err();
        assert!(matches!(err, MountOpError::Cancelled));

        let pioneer_path = pioneer.await.unwrap().unwrap();
        assert_eq!(manager.ref_count(&pioneer_path).await, Some(1));
    }
}
