//! Staged transfer of one subject's session data
//!
//! Steps for a session:
//! 1. fetch the host PC data into `session_<n>/host_pc` (skipped when present)
//! 2. sync the whole session directory to the destination
//! 3. move `host_pc` into the archive, where the sweeper later expires it
//!
//! No state is kept between runs. Each step inspects the filesystem first, so
//! re-running after a failure resumes at the first incomplete step. Every
//! public operation writes its outcome to the audit log before returning.

use crate::config::HostPcSettings;
use crate::copy::{copy_tree, move_dir};
use crate::credentials::PasswordSource;
use crate::error::{Result, TransferError};
use crate::logger::{record, Logger};
use crate::mount::{with_mount, CommandMounter, Mounter};
use crate::paths::{archive_entry, host_session_directory, DataLayout, SessionId};
use crate::progress::CopyProgress;
use crate::state::SessionState;
use crate::transport::Transport;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Proof that a session directory was synced. Only [`Uploader::upload`] creates
/// one, and [`Uploader::archive`] consumes it.
#[derive(Debug)]
pub struct SyncReceipt {
    id: SessionId,
}

impl SyncReceipt {
    pub fn session(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::Uploaded
    }
}

struct HostAccess {
    settings: HostPcSettings,
    passwords: Box<dyn PasswordSource>,
}

pub struct Uploader {
    subject: String,
    layout: DataLayout,
    archive_root: PathBuf,
    calibration_experiment: String,
    host: Option<HostAccess>,
    mounter: Box<dyn Mounter>,
    transport: Box<dyn Transport>,
    logger: Arc<dyn Logger>,
    show_progress: bool,
}

impl Uploader {
    pub fn new(
        subject: impl Into<String>,
        layout: DataLayout,
        archive_root: impl Into<PathBuf>,
        transport: Box<dyn Transport>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            subject: subject.into(),
            layout,
            archive_root: archive_root.into(),
            calibration_experiment: "AmplitudeDetermination".to_string(),
            host: None,
            mounter: Box::new(CommandMounter::default()),
            transport,
            logger,
            show_progress: false,
        }
    }

    /// Host PC share settings and where its password comes from.
    pub fn with_host(mut self, settings: HostPcSettings, passwords: Box<dyn PasswordSource>) -> Self {
        self.mounter = Box::new(CommandMounter {
            mount: settings.mount_command.clone(),
            unmount: settings.unmount_command.clone(),
        });
        self.host = Some(HostAccess {
            settings,
            passwords,
        });
        self
    }

    /// Replace the mounter (call after `with_host`, which installs the command mounter).
    pub fn with_mounter(mut self, mounter: Box<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    pub fn with_calibration_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.calibration_experiment = experiment.into();
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn id(&self, experiment: &str, session: u32) -> SessionId {
        SessionId::new(self.subject.clone(), experiment, session)
    }

    pub fn session_dir(&self, experiment: &str, session: u32) -> PathBuf {
        self.layout.session_dir(&self.id(experiment, session))
    }

    pub fn state(&self, experiment: &str, session: u32) -> Result<SessionState> {
        SessionState::inspect(&self.layout, &self.archive_root, &self.id(experiment, session))
    }

    /// Copy the session's data from the host PC into `host_pc`, unless already done.
    pub fn fetch_host_data(&self, experiment: &str, session: u32) -> Result<bool> {
        let id = self.id(experiment, session);
        record(&*self.logger, "fetch_host_data", || self.fetch(&id))
    }

    fn fetch(&self, id: &SessionId) -> Result<bool> {
        let session_dir = self.layout.session_dir(id);
        if id.experiment == self.calibration_experiment {
            fs::create_dir_all(&session_dir)?;
        }

        match SessionState::inspect(&self.layout, &self.archive_root, id)? {
            SessionState::Fetched => {
                println!(
                    "{} already exists; not attempting to transfer data from the host PC",
                    self.layout.host_dir(id).display()
                );
                println!("If you want to re-transfer, please manually delete the host_pc directory");
                return Ok(true);
            }
            SessionState::Archived => {
                println!("{id} was already transferred and archived; not fetching it again");
                return Ok(true);
            }
            SessionState::NotFetched | SessionState::Uploaded => {}
        }

        if !session_dir.is_dir() {
            return Err(TransferError::NotFound(session_dir));
        }
        let host = self.host.as_ref().ok_or_else(|| {
            TransferError::Precondition("no host PC settings configured".to_string())
        })?;
        let share = host.settings.share(host.passwords.host_password()?);

        let partial = self.layout.partial_host_dir(id);
        if partial.exists() {
            println!("Removing incomplete transfer {}", partial.display());
            fs::remove_dir_all(&partial)?;
        }

        let progress = CopyProgress::new(self.show_progress);
        with_mount(&*self.mounter, &*self.logger, &share, |mount_point| {
            let host_dir =
                host_session_directory(mount_point, &id.subject, &id.experiment, id.session);
            if !host_dir.is_dir() {
                return Err(TransferError::NotFound(host_dir));
            }
            copy_tree(&host_dir, &partial, &progress)
        })?;

        fs::rename(&partial, self.layout.host_dir(id))?;
        Ok(true)
    }

    /// Fetch (if needed), then sync the whole session directory to `destination`.
    pub fn upload(
        &self,
        experiment: &str,
        session: u32,
        destination: &str,
    ) -> Result<Option<SyncReceipt>> {
        let id = self.id(experiment, session);
        record(&*self.logger, "upload", || {
            self.fetch_host_data(experiment, session)?;
            let synced = self
                .transport
                .sync(&self.layout.session_dir(&id), destination)?;
            Ok(synced.then(|| SyncReceipt { id: id.clone() }))
        })
    }

    /// Move the synced session's `host_pc` directory under the archive root.
    pub fn archive(&self, receipt: SyncReceipt) -> Result<()> {
        record(&*self.logger, "archive", || self.archive_session(&receipt.id))
    }

    fn archive_session(&self, id: &SessionId) -> Result<()> {
        match SessionState::inspect(&self.layout, &self.archive_root, id)? {
            SessionState::Fetched => {}
            SessionState::Archived => {
                println!("{id} is already archived");
                return Ok(());
            }
            SessionState::NotFetched | SessionState::Uploaded => {
                return Err(TransferError::Precondition(format!(
                    "{id} has no host_pc data to archive"
                )));
            }
        }

        fs::create_dir_all(&self.archive_root)?;
        let dest = archive_entry(&self.archive_root, &id.subject, &id.experiment, id.session);
        move_dir(
            &self.layout.host_dir(id),
            &dest,
            &CopyProgress::new(self.show_progress),
        )?;

        // The sweeper ages whole subject entries; a fresh session restarts the clock.
        set_file_mtime(self.archive_root.join(&id.subject), FileTime::now())?;
        Ok(())
    }

    /// Fetch, upload and archive one session. False if the sync reported failure.
    pub fn upload_experiment_data(
        &self,
        experiment: &str,
        session: u32,
        destination: &str,
    ) -> Result<bool> {
        record(&*self.logger, "upload_experiment_data", || {
            match self.upload(experiment, session, destination)? {
                Some(receipt) => {
                    self.archive(receipt)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Sync an imaging directory.
    pub fn upload_imaging(&self, src: &Path, destination: &str) -> Result<bool> {
        record(&*self.logger, "upload_imaging", || self.upload_dir(src, destination))
    }

    /// Sync a clinical EEG directory.
    pub fn upload_clinical_eeg(&self, src: &Path, destination: &str) -> Result<bool> {
        record(&*self.logger, "upload_clinical_eeg", || {
            self.upload_dir(src, destination)
        })
    }

    fn upload_dir(&self, src: &Path, destination: &str) -> Result<bool> {
        if !src.is_dir() {
            return Err(TransferError::NotFound(src.to_path_buf()));
        }
        self.transport.sync(src, destination)
    }
}
