use std::path::{Path, PathBuf};

use tokio::select;
use tracing::{debug, info};

use crate::app_config;

mod managed_fuse {
    //! Owns the mount for its whole lifetime. Dropping a fuser
    //! `BackgroundSession` only attempts a polite unmount, so [`ManagedFuse`]
    //! follows up with a forced detach.
    use std::path::PathBuf;
    use std::time::Duration;

    use fuser::BackgroundSession;
    use nix::errno::Errno;
    use tree_fs::fs::TreeFs;
    use tree_fs::fs::dir_tree::DirTree;
    use tree_fs::fs::fuser::FuserAdapter;

    use super::{app_config, debug};
    use tracing::error;

    pub struct FuseCoreScope {
        _session: BackgroundSession,
    }

    impl FuseCoreScope {
        fn spawn(
            source: PathBuf,
            config: &app_config::Config,
            handle: tokio::runtime::Handle,
        ) -> Result<Self, std::io::Error> {
            let fs = TreeFs::new(DirTree::new(source), config.fs_config());
            let fuse_adapter = FuserAdapter::new(fs, handle);
            let mount_opts = [
                fuser::MountOption::FSName("tree-fs".to_owned()),
                fuser::MountOption::RO,
                fuser::MountOption::NoDev,
                fuser::MountOption::NoSuid,
                fuser::MountOption::AutoUnmount,
                fuser::MountOption::DefaultPermissions,
            ];

            Ok(Self {
                _session: fuser::spawn_mount2(fuse_adapter, &config.mount_point, &mount_opts)?,
            })
        }
    }

    pub struct ManagedFuse {
        mount_point: PathBuf,
    }

    impl ManagedFuse {
        pub fn new(config: &app_config::Config) -> Self {
            Self {
                mount_point: config.mount_point.clone(),
            }
        }

        pub fn spawn(
            &self,
            source: PathBuf,
            config: &app_config::Config,
            handle: tokio::runtime::Handle,
        ) -> Result<FuseCoreScope, std::io::Error> {
            debug!(mount_point = ?self.mount_point, source = ?source, "Spawning FUSE session...");
            FuseCoreScope::spawn(source, config, handle)
        }
    }

    impl Drop for ManagedFuse {
        fn drop(&mut self) {
            const UMOUNT_ATTEMPT_COUNT: usize = 10;
            const UMOUNT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

            debug!(mount_point = ?self.mount_point, "Confirming unmount of FUSE filesystem...");

            for attempt in 1..=UMOUNT_ATTEMPT_COUNT {
                #[cfg(target_os = "macos")]
                let result = nix::mount::unmount(&self.mount_point, nix::mount::MntFlags::MNT_FORCE);
                #[cfg(not(target_os = "macos"))]
                let result =
                    nix::mount::umount2(&self.mount_point, nix::mount::MntFlags::MNT_DETACH);

                match result {
                    Ok(()) => {
                        debug!(attempt, "Unmounted FUSE filesystem.");
                        break;
                    }
                    Err(Errno::EBUSY) => {
                        debug!(attempt, "FUSE filesystem still busy, retrying...");
                        std::thread::sleep(UMOUNT_ATTEMPT_DELAY);
                    }
                    Err(Errno::EINVAL | Errno::ENOENT) => {
                        debug!(attempt, "FUSE filesystem already unmounted.");
                        break;
                    }
                    Err(e) => {
                        error!(attempt, error = %e, "Failed to unmount FUSE filesystem.");
                        break;
                    }
                }
            }
        }
    }
}

/// Prepares the mount point directory.
///
/// Missing directories are created. An existing directory must be empty.
async fn prepare_mount_point(mount_point: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::read_dir(mount_point).await {
        Ok(mut entries) => {
            if entries.next_entry().await?.is_some() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Mount point '{}' already exists and is not empty.",
                        mount_point.display()
                    ),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(mount_point).await?;
            info!(path = %mount_point.display(), "Created mount point directory.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn wait_for_exit() -> Result<(), std::io::Error> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
    select! {
        _ = signal::ctrl_c() => {
            debug!("Received Ctrl+C signal, shutting down...");
        },
        _ = sigterm.recv() => {
            debug!("Received termination signal, shutting down...");
        },
        _ = sighup.recv() => {
            debug!("Received hangup signal, shutting down...");
        },
    }
    Ok(())
}

/// Mount the configured source and serve it until a shutdown signal arrives.
pub async fn run(
    config: app_config::Config,
    handle: tokio::runtime::Handle,
) -> Result<(), std::io::Error> {
    let source: PathBuf = config.source.clone().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no source directory given")
    })?;

    prepare_mount_point(&config.mount_point).await?;

    info!(
        "Mounting {} at {}.",
        source.display(),
        config.mount_point.display()
    );

    let fuse = managed_fuse::ManagedFuse::new(&config);
    {
        let _session = fuse.spawn(source, &config, handle)?;
        info!("tree-fs is running. Press Ctrl+C to stop.");

        wait_for_exit().await?;
    }
    Ok(())
}

pub fn spawn(config: app_config::Config) -> Result<(), std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, runtime.handle().clone()))
}
