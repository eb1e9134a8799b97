//! Scoped mounting of the host PC share
//!
//! `with_mount` creates an empty mount point, mounts the share there and
//! hands the mount point to a closure. A guard unmounts on every exit path,
//! including unwinding. Unmount failures are reported, never raised, so they
//! cannot hide the error that ended the scope.

use crate::command::{display_command, CommandTemplate, Vars};
use crate::error::{Result, TransferError};
use crate::logger::Logger;
use std::fs;
use std::path::{Path, PathBuf};

/// Network share on the host PC plus the credentials to reach it.
#[derive(Clone)]
pub struct ShareAddress {
    pub user: String,
    pub password: String,
    pub addr: String,
    pub share: String,
}

impl ShareAddress {
    /// `//user:password@addr/share`, as passed to the mount command.
    pub fn connection_string(&self) -> String {
        format!("//{}:{}@{}/{}", self.user, self.password, self.addr, self.share)
    }

    fn vars(&self, mount_point: &Path) -> Vars {
        let mut vars = Vars::new();
        vars.insert("user", self.user.clone());
        vars.insert("password", self.password.clone());
        vars.insert("addr", self.addr.clone());
        vars.insert("share", self.share.clone());
        vars.insert("mount_point", mount_point.to_string_lossy().into_owned());
        vars
    }
}

impl std::fmt::Display for ShareAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "//{}:***@{}/{}", self.user, self.addr, self.share)
    }
}

impl std::fmt::Debug for ShareAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShareAddress({self})")
    }
}

pub trait Mounter {
    fn mount(&self, share: &ShareAddress, mount_point: &Path) -> Result<()>;
    fn unmount(&self, mount_point: &Path) -> Result<()>;
}

/// Mounts with external commands (`mount_smbfs` / `umount` by default).
pub struct CommandMounter {
    pub mount: CommandTemplate,
    pub unmount: CommandTemplate,
}

impl Default for CommandMounter {
    fn default() -> Self {
        Self {
            mount: default_mount_command(),
            unmount: default_unmount_command(),
        }
    }
}

pub fn default_mount_command() -> CommandTemplate {
    CommandTemplate::new(["mount_smbfs", "//{user}:{password}@{addr}/{share}", "{mount_point}"])
}

pub fn default_unmount_command() -> CommandTemplate {
    CommandTemplate::new(["umount", "{mount_point}"])
}

impl Mounter for CommandMounter {
    fn mount(&self, share: &ShareAddress, mount_point: &Path) -> Result<()> {
        let mount_err = |reason: String| TransferError::Mount {
            share: share.to_string(),
            mount_point: mount_point.to_path_buf(),
            reason,
        };
        println!("Mounting host PC. This may take several seconds...");
        match self.mount.run(&share.vars(mount_point)) {
            Ok((_, status)) if status.success() => Ok(()),
            Ok((argv, status)) => Err(mount_err(format!(
                "`{}` exited with {}",
                display_command(&argv, Some(&share.password)),
                status
            ))),
            Err(e) => Err(mount_err(e.to_string())),
        }
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        println!("Unmounting host PC...");
        let mut vars = Vars::new();
        vars.insert("mount_point", mount_point.to_string_lossy().into_owned());
        let (argv, status) = self.unmount.run(&vars)?;
        if status.success() {
            Ok(())
        } else {
            Err(TransferError::TransferFailure {
                command: display_command(&argv, None),
                status: status.to_string(),
            })
        }
    }
}

/// Live mount. Dropping it unmounts and removes the (empty) mount point.
pub struct MountGuard<'a> {
    mounter: &'a dyn Mounter,
    logger: &'a dyn Logger,
    mount_point: PathBuf,
}

impl<'a> MountGuard<'a> {
    pub fn acquire(
        mounter: &'a dyn Mounter,
        logger: &'a dyn Logger,
        share: &ShareAddress,
    ) -> Result<Self> {
        let mount_point = std::env::temp_dir().join(format!("stagesync-mnt-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&mount_point)?;
        if let Err(e) = mounter.mount(share, &mount_point) {
            eprintln!("Error mounting host PC!");
            remove_mount_point(logger, &mount_point);
            return Err(e);
        }
        Ok(Self {
            mounter,
            logger,
            mount_point,
        })
    }

    pub fn path(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mounter.unmount(&self.mount_point) {
            eprintln!("Error unmounting {}: {}", self.mount_point.display(), e);
            self.logger
                .warning("unmount", &self.mount_point, &e.to_string());
            // Still mounted: leave the directory alone.
            return;
        }
        remove_mount_point(self.logger, &self.mount_point);
    }
}

fn remove_mount_point(logger: &dyn Logger, mount_point: &Path) {
    // Non-recursive on purpose: never delete through a live mount.
    if let Err(e) = fs::remove_dir(mount_point) {
        eprintln!(
            "Unable to remove mount point {}: {}",
            mount_point.display(),
            e
        );
        logger.warning("remove_mount_point", mount_point, &e.to_string());
    }
}

/// Run `f` with the share mounted; unmount afterwards no matter how `f` ends.
pub fn with_mount<T, F>(
    mounter: &dyn Mounter,
    logger: &dyn Logger,
    share: &ShareAddress,
    f: F,
) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let guard = MountGuard::acquire(mounter, logger, share)?;
    let out = f(guard.path());
    drop(guard);
    out
}
