//! Update orchestration.
//!
//! [`UpdateManager`] drives the update state machine for the most recently
//! announced release: download into `downloads/<version>/`, then hand the
//! payload to the platform [`Installer`]. A finished download stays there
//! across restarts until it is installed. Every phase change is broadcast
//! so the presentation layer can show progress.

use crate::download::Downloader;
use crate::install::{remove_stale_executable, Installer};
use crate::update_fsm::{UpdateMachine, UpdateMachineInput, UpdatePhase};
use crate::{UpdateError, UpdateResult};
use client_config_and_utils::InstallLayout;
use client_storage::{CredentialStore, UpdateRecord};
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

/// A path component that names exactly one entry.
fn single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

fn remove_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

pub struct UpdateManager {
    store: Arc<dyn CredentialStore>,
    downloader: Arc<dyn Downloader>,
    installer: Arc<dyn Installer>,
    layout: InstallLayout,
    downloads_dir: PathBuf,
    fsm: Mutex<UpdateMachine>,
    current: Mutex<Option<UpdateRecord>>,
    phase_tx: broadcast::Sender<UpdatePhase>,
    busy: tokio::sync::Mutex<()>,
}

impl UpdateManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        downloader: Arc<dyn Downloader>,
        installer: Arc<dyn Installer>,
        layout: InstallLayout,
        downloads_dir: PathBuf,
    ) -> Self {
        if installer.platform() != layout.platform {
            warn!(
                installer = %installer.platform(),
                layout = %layout.platform,
                "Installer does not match install layout"
            );
        }

        let (phase_tx, _) = broadcast::channel(32);
        Self {
            store,
            downloader,
            installer,
            layout,
            downloads_dir,
            fsm: Mutex::new(UpdateMachine::new()),
            current: Mutex::new(None),
            phase_tx,
            busy: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        UpdatePhase::from(self.fsm.lock().state())
    }

    /// Receive every phase change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdatePhase> {
        self.phase_tx.subscribe()
    }

    /// The record most recently announced or acted upon.
    pub fn current_record(&self) -> Option<UpdateRecord> {
        self.current.lock().clone()
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    fn transition(&self, input: &UpdateMachineInput) -> UpdateResult<UpdatePhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = UpdatePhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            UpdateError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = UpdatePhase::from(fsm.state());
        drop(fsm);

        if old_phase != new_phase {
            debug!(old_phase = ?old_phase, new_phase = ?new_phase, "Update state transition");
            // No subscribers is fine.
            let _ = self.phase_tx.send(new_phase);
        }

        Ok(new_phase)
    }

    /// Take note of an update announced by the service.
    ///
    /// Only accepted while no upgrade is running; the record stays in the
    /// store either way and is picked up by the next [`start_upgrade`].
    ///
    /// [`start_upgrade`]: UpdateManager::start_upgrade
    pub fn announce(&self, record: UpdateRecord) -> UpdateResult<()> {
        self.transition(&UpdateMachineInput::VersionAnnounced)?;
        info!(version = %record.version, "Update announced");
        *self.current.lock() = Some(record);
        Ok(())
    }

    /// Download (unless already on disk) and install the newest known update.
    ///
    /// Fails with [`UpdateError::UpgradeInProgress`] while another upgrade is
    /// running. A failed attempt leaves the machine in `Failed`; calling this
    /// again retries.
    pub async fn start_upgrade(&self) -> UpdateResult<UpdateRecord> {
        let _busy = self
            .busy
            .try_lock()
            .map_err(|_| UpdateError::UpgradeInProgress)?;

        if self.phase() == UpdatePhase::Failed {
            self.transition(&UpdateMachineInput::Reset)?;
        }

        let record = self
            .store
            .last_update()?
            .ok_or(UpdateError::NoUpdateAvailable)?;
        if record.is_installed {
            return Err(UpdateError::AlreadyInstalled(record.version));
        }
        *self.current.lock() = Some(record.clone());

        let archive = match self.downloaded_archive(&record)? {
            Some(archive) => {
                debug!(version = %record.version, archive = %archive.display(), "Using earlier download");
                self.transition(&UpdateMachineInput::AlreadyDownloaded)?;
                archive
            }
            None => {
                self.transition(&UpdateMachineInput::StartDownload)?;
                match self.download(&record).await {
                    Ok(archive) => {
                        self.transition(&UpdateMachineInput::DownloadSucceeded)?;
                        archive
                    }
                    Err(e) => {
                        self.transition(&UpdateMachineInput::DownloadFailed)?;
                        warn!(version = %record.version, error = %e, "Update download failed");
                        self.discard_download(&record.version);
                        return Err(e);
                    }
                }
            }
        };

        self.transition(&UpdateMachineInput::BeginInstall)?;
        match self.install(&record, &archive).await {
            Ok(()) => {
                self.transition(&UpdateMachineInput::InstallSucceeded)?;
                info!(version = %record.version, "Update installed");
                let installed = UpdateRecord {
                    is_downloaded: false,
                    is_installed: true,
                    ..record
                };
                *self.current.lock() = Some(installed.clone());
                Ok(installed)
            }
            Err(e) => {
                self.transition(&UpdateMachineInput::InstallFailed)?;
                warn!(version = %record.version, error = %e, "Update install failed");
                if e.discards_download() {
                    self.discard_download(&record.version);
                }
                Err(e)
            }
        }
    }

    /// Where the payload of `record` is downloaded to.
    fn archive_path(&self, record: &UpdateRecord) -> UpdateResult<PathBuf> {
        let file_name = record
            .file_name()
            .filter(|name| single_component(name))
            .ok_or_else(|| UpdateError::InvalidUrl(record.url.clone()))?;
        if !single_component(&record.version) {
            return Err(UpdateError::InvalidUrl(format!(
                "version {:?} is not a file name",
                record.version
            )));
        }
        Ok(self.downloads_dir.join(&record.version).join(file_name))
    }

    /// The archive of an earlier download of `record`, if the store says it
    /// finished and it is still on disk. A downloaded flag without a file is
    /// cleared.
    fn downloaded_archive(&self, record: &UpdateRecord) -> UpdateResult<Option<PathBuf>> {
        if !record.is_downloaded {
            return Ok(None);
        }

        let archive = self.archive_path(record)?;
        if archive.is_file() {
            return Ok(Some(archive));
        }

        warn!(version = %record.version, archive = %archive.display(), "Downloaded archive is missing");
        self.store.remove_downloaded(&record.version)?;
        Ok(None)
    }

    /// Forget a download so the next attempt fetches it again. Failures are
    /// only logged.
    fn discard_download(&self, version: &str) {
        let dir = self.downloads_dir.join(version);
        if single_component(version) {
            if let Err(e) = remove_dir(&dir) {
                warn!(dir = %dir.display(), error = %e, "Could not remove download");
            }
        }
        if let Err(e) = self.store.remove_downloaded(version) {
            warn!(version, error = %e, "Could not clear downloaded flag");
        }
    }

    async fn download(&self, record: &UpdateRecord) -> UpdateResult<PathBuf> {
        let archive = self.archive_path(record)?;
        if let Some(dir) = archive.parent() {
            // A partial file from an earlier attempt is overwritten.
            std::fs::create_dir_all(dir)?;
        }

        let (result_tx, result_rx) = oneshot::channel();
        let downloader = self.downloader.clone();
        let url = record.url.clone();
        let dest = archive.clone();
        tokio::spawn(async move {
            let result = downloader.download(&url, &dest).await;
            let _ = result_tx.send(result);
        });

        result_rx
            .await
            .map_err(|_| UpdateError::DownloadFailed("download worker stopped".to_string()))??;

        self.store.mark_downloaded(&record.version)?;
        Ok(archive)
    }

    async fn install(&self, record: &UpdateRecord, archive: &Path) -> UpdateResult<()> {
        let installer = self.installer.clone();
        let layout = self.layout.clone();
        let download = archive.to_path_buf();
        let workdir = archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.downloads_dir.clone());

        let dir = workdir.clone();
        tokio::task::spawn_blocking(move || installer.install(&download, &workdir, &layout))
            .await
            .map_err(|e| UpdateError::InstallFailed(format!("install task failed: {}", e)))??;

        // The payload is consumed.
        if let Err(e) = remove_dir(&dir) {
            warn!(dir = %dir.display(), error = %e, "Could not remove installed download");
        }
        self.store.remove_downloaded(&record.version)?;
        self.store.mark_installed(&record.version)?;
        Ok(())
    }

    /// Clean up after an install interrupted by a restart: remove the old
    /// executable's `.tmp` sibling and download directories of versions that
    /// are not waiting to be installed. Finished downloads are kept.
    ///
    /// Must run at startup before any update attempt.
    pub fn recover_interrupted_install(&self) -> UpdateResult<bool> {
        let removed = remove_stale_executable(&self.layout)?;

        let entries = match std::fs::read_dir(&self.downloads_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(version) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(record) = self.store.get_update(&version)? else {
                continue;
            };
            if record.is_downloaded && !record.is_installed {
                debug!(version = %version, "Keeping finished download");
                continue;
            }
            debug!(dir = %entry.path().display(), "Removing leftover download");
            remove_dir(&entry.path())?;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use client_config_and_utils::Platform;
    use client_storage::{Credential, SqliteStore, StorageError, StorageResult};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeDownloader {
        calls: AtomicUsize,
        fail: bool,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> UpdateResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail {
                return Err(UpdateError::DownloadFailed("server returned 404".into()));
            }
            std::fs::write(dest, b"payload")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeInstaller {
        calls: AtomicUsize,
        results: Mutex<VecDeque<UpdateResult<()>>>,
    }

    impl FakeInstaller {
        fn failing_once(error: UpdateError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                results: Mutex::new(VecDeque::from([Err(error)])),
            }
        }
    }

    impl Installer for FakeInstaller {
        fn platform(&self) -> Platform {
            Platform::Linux
        }

        fn install(&self, download: &Path, _workdir: &Path, _layout: &InstallLayout) -> UpdateResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(std::fs::read(download).unwrap(), b"payload");
            self.results.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<SqliteStore>,
        downloader: Arc<FakeDownloader>,
        installer: Arc<FakeInstaller>,
        manager: Arc<UpdateManager>,
    }

    fn manager_in(
        dir: &Path,
        store: Arc<dyn CredentialStore>,
        downloader: Arc<FakeDownloader>,
        installer: Arc<FakeInstaller>,
    ) -> Arc<UpdateManager> {
        Arc::new(UpdateManager::new(
            store,
            downloader,
            installer,
            InstallLayout::new(Platform::Linux, dir.join("app")),
            dir.join("downloads"),
        ))
    }

    fn fixture(downloader: FakeDownloader, installer: FakeInstaller) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let downloader = Arc::new(downloader);
        let installer = Arc::new(installer);
        let manager = manager_in(dir.path(), store.clone(), downloader.clone(), installer.clone());
        Fixture {
            _dir: dir,
            store,
            downloader,
            installer,
            manager,
        }
    }

    /// Delegates to SQLite but fails the next `remove_downloaded` calls.
    struct FlakyStore {
        inner: SqliteStore,
        failures: AtomicUsize,
    }

    impl CredentialStore for FlakyStore {
        fn add_user(&self, email: &str, password: &str) -> StorageResult<()> {
            self.inner.add_user(email, password)
        }

        fn delete_user(&self) -> StorageResult<()> {
            self.inner.delete_user()
        }

        fn last_user(&self) -> StorageResult<Option<Credential>> {
            self.inner.last_user()
        }

        fn get_update(&self, version: &str) -> StorageResult<Option<UpdateRecord>> {
            self.inner.get_update(version)
        }

        fn add_update(
            &self,
            version: &str,
            url: &str,
            platform: Platform,
            arch: &str,
        ) -> StorageResult<UpdateRecord> {
            self.inner.add_update(version, url, platform, arch)
        }

        fn mark_downloaded(&self, version: &str) -> StorageResult<()> {
            self.inner.mark_downloaded(version)
        }

        fn mark_installed(&self, version: &str) -> StorageResult<()> {
            self.inner.mark_installed(version)
        }

        fn remove_downloaded(&self, version: &str) -> StorageResult<()> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StorageError::InvalidData("disk I/O error".into()));
            }
            self.inner.remove_downloaded(version)
        }

        fn last_update(&self) -> StorageResult<Option<UpdateRecord>> {
            self.inner.last_update()
        }
    }

    fn add_release(store: &SqliteStore, version: &str) -> UpdateRecord {
        store
            .add_update(
                version,
                &format!("https://chainprox.com/releases/chainprox-{}.tar.gz", version),
                Platform::Linux,
                "x86_64",
            )
            .unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<UpdatePhase>) -> Vec<UpdatePhase> {
        let mut phases = Vec::new();
        while let Ok(phase) = rx.try_recv() {
            phases.push(phase);
        }
        phases
    }

    fn download_dirs(fx: &Fixture) -> usize {
        std::fs::read_dir(&fx.manager.downloads_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_no_update_available() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());

        let result = fx.manager.start_upgrade().await;

        assert!(matches!(result, Err(UpdateError::NoUpdateAvailable)));
        assert_eq!(fx.manager.phase(), UpdatePhase::Idle);
    }

    #[tokio::test]
    async fn test_successful_upgrade() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        add_release(&fx.store, "1.1.0");
        let mut phases = fx.manager.subscribe();

        let record = fx.manager.start_upgrade().await.unwrap();

        assert!(record.is_installed);
        assert!(!record.is_downloaded);
        assert_eq!(fx.manager.phase(), UpdatePhase::Installed);
        assert_eq!(
            drain(&mut phases),
            vec![
                UpdatePhase::Downloading,
                UpdatePhase::Downloaded,
                UpdatePhase::Installing,
                UpdatePhase::Installed,
            ]
        );
        assert_eq!(download_dirs(&fx), 0);

        let stored = fx.store.get_update("1.1.0").unwrap().unwrap();
        assert!(stored.is_installed);
        assert!(!stored.is_downloaded);
    }

    #[tokio::test]
    async fn test_retry_after_install_failure_skips_download() {
        let fx = fixture(
            FakeDownloader::default(),
            FakeInstaller::failing_once(UpdateError::InstallFailed("disk full".into())),
        );
        add_release(&fx.store, "1.1.0");

        let first = fx.manager.start_upgrade().await;
        assert!(matches!(first, Err(UpdateError::InstallFailed(_))));
        assert_eq!(fx.manager.phase(), UpdatePhase::Failed);
        assert!(fx.store.get_update("1.1.0").unwrap().unwrap().is_downloaded);

        let mut phases = fx.manager.subscribe();
        fx.manager.start_upgrade().await.unwrap();

        assert_eq!(fx.downloader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.installer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            drain(&mut phases),
            vec![
                UpdatePhase::Idle,
                UpdatePhase::Downloaded,
                UpdatePhase::Installing,
                UpdatePhase::Installed,
            ]
        );
    }

    #[tokio::test]
    async fn test_download_failure_then_retry_downloads_again() {
        let fx = fixture(
            FakeDownloader {
                fail: true,
                ..Default::default()
            },
            FakeInstaller::default(),
        );
        add_release(&fx.store, "1.1.0");

        let result = fx.manager.start_upgrade().await;
        assert!(matches!(result, Err(UpdateError::DownloadFailed(_))));
        assert_eq!(fx.manager.phase(), UpdatePhase::Failed);
        assert!(!fx.store.get_update("1.1.0").unwrap().unwrap().is_downloaded);

        let _ = fx.manager.start_upgrade().await;
        assert_eq!(fx.downloader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.installer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_archive_is_downloaded_again() {
        let fx = fixture(
            FakeDownloader::default(),
            FakeInstaller::failing_once(UpdateError::PathTraversalDetected("../evil".into())),
        );
        add_release(&fx.store, "1.1.0");

        let first = fx.manager.start_upgrade().await;
        assert!(matches!(first, Err(UpdateError::PathTraversalDetected(_))));
        assert!(!fx.store.get_update("1.1.0").unwrap().unwrap().is_downloaded);
        assert_eq!(download_dirs(&fx), 0);

        fx.manager.start_upgrade().await.unwrap();
        assert_eq!(fx.downloader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_downloaded_flag_without_file_downloads_again() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        add_release(&fx.store, "1.1.0");
        fx.store.mark_downloaded("1.1.0").unwrap();

        fx.manager.start_upgrade().await.unwrap();

        assert_eq!(fx.downloader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finished_download_survives_restart() {
        let fx = fixture(
            FakeDownloader::default(),
            FakeInstaller::failing_once(UpdateError::InstallFailed("disk full".into())),
        );
        add_release(&fx.store, "1.1.0");
        assert!(fx.manager.start_upgrade().await.is_err());

        // A fresh process over the same store and directories.
        let downloader = Arc::new(FakeDownloader::default());
        let restarted = manager_in(
            fx._dir.path(),
            fx.store.clone(),
            downloader.clone(),
            Arc::new(FakeInstaller::default()),
        );
        restarted.recover_interrupted_install().unwrap();
        let mut phases = restarted.subscribe();

        let record = restarted.start_upgrade().await.unwrap();

        assert!(record.is_installed);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            drain(&mut phases),
            vec![
                UpdatePhase::Downloaded,
                UpdatePhase::Installing,
                UpdatePhase::Installed,
            ]
        );
        assert_eq!(download_dirs(&fx), 0);
    }

    #[tokio::test]
    async fn test_storage_error_while_discarding_still_fails_cleanly() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            failures: AtomicUsize::new(1),
        });
        store
            .add_update(
                "1.1.0",
                "https://chainprox.com/releases/chainprox-1.1.0.tar.gz",
                Platform::Linux,
                "x86_64",
            )
            .unwrap();
        let downloader = Arc::new(FakeDownloader::default());
        let manager = manager_in(
            dir.path(),
            store.clone(),
            downloader.clone(),
            Arc::new(FakeInstaller::failing_once(UpdateError::PathTraversalDetected(
                "../evil".into(),
            ))),
        );

        let first = manager.start_upgrade().await;
        assert!(matches!(first, Err(UpdateError::PathTraversalDetected(_))));
        assert_eq!(manager.phase(), UpdatePhase::Failed);

        let second = manager.start_upgrade().await.unwrap();
        assert!(second.is_installed);
        assert_eq!(manager.phase(), UpdatePhase::Installed);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_already_installed() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        add_release(&fx.store, "1.1.0");
        fx.store.mark_installed("1.1.0").unwrap();

        let result = fx.manager.start_upgrade().await;

        assert!(matches!(result, Err(UpdateError::AlreadyInstalled(v)) if v == "1.1.0"));
        assert_eq!(fx.downloader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_upgrade_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let fx = fixture(
            FakeDownloader {
                gate: Some((entered.clone(), release.clone())),
                ..Default::default()
            },
            FakeInstaller::default(),
        );
        add_release(&fx.store, "1.1.0");

        let manager = fx.manager.clone();
        let first = tokio::spawn(async move { manager.start_upgrade().await });
        entered.notified().await;

        assert_eq!(fx.manager.phase(), UpdatePhase::Downloading);
        assert!(matches!(
            fx.manager.start_upgrade().await,
            Err(UpdateError::UpgradeInProgress)
        ));

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[test]
    fn test_announce_moves_to_checking() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        let record = add_release(&fx.store, "1.1.0");

        fx.manager.announce(record.clone()).unwrap();

        assert_eq!(fx.manager.phase(), UpdatePhase::Checking);
        assert_eq!(fx.manager.current_record(), Some(record));
    }

    #[tokio::test]
    async fn test_announce_rejected_after_failure() {
        let fx = fixture(
            FakeDownloader {
                fail: true,
                ..Default::default()
            },
            FakeInstaller::default(),
        );
        let record = add_release(&fx.store, "1.1.0");
        let _ = fx.manager.start_upgrade().await;

        let result = fx.manager.announce(record);

        assert!(matches!(result, Err(UpdateError::InvalidStateTransition(_))));
        assert_eq!(fx.manager.phase(), UpdatePhase::Failed);
    }

    #[test]
    fn test_recover_interrupted_install() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        let layout = fx.manager.layout().clone();
        std::fs::create_dir_all(&layout.app_dir).unwrap();
        std::fs::write(layout.staged_old_path(), b"old").unwrap();

        add_release(&fx.store, "1.0.0");
        add_release(&fx.store, "1.1.0");
        fx.store.mark_downloaded("1.1.0").unwrap();
        let abandoned = fx.manager.downloads_dir.join("1.0.0");
        let finished = fx.manager.downloads_dir.join("1.1.0");
        let unrelated = fx.manager.downloads_dir.join("keep-me");
        for dir in [&abandoned, &finished, &unrelated] {
            std::fs::create_dir_all(dir).unwrap();
        }

        assert!(fx.manager.recover_interrupted_install().unwrap());

        assert!(!layout.staged_old_path().exists());
        assert!(!abandoned.exists());
        assert!(finished.exists());
        assert!(unrelated.exists());
        assert!(!fx.manager.recover_interrupted_install().unwrap());
    }

    #[test]
    fn test_archive_path_rejects_odd_versions() {
        let fx = fixture(FakeDownloader::default(), FakeInstaller::default());
        let mut record = add_release(&fx.store, "1.1.0");

        assert_eq!(
            fx.manager.archive_path(&record).unwrap(),
            fx.manager
                .downloads_dir
                .join("1.1.0")
                .join("chainprox-1.1.0.tar.gz")
        );

        record.version = "../1.1.0".into();
        assert!(matches!(
            fx.manager.archive_path(&record),
            Err(UpdateError::InvalidUrl(_))
        ));
    }
}
