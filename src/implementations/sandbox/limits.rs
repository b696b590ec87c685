//! Per-process resource ceilings and process-group teardown.

use std::time::Duration;

/// True when the address-space ceiling can be applied on this platform
pub const MEMORY_LIMIT_SUPPORTED: bool = cfg!(unix);

const FILE_SIZE_LIMIT: u64 = 16 * 1024 * 1024;
const OPEN_FILES_LIMIT: u64 = 64;

/// Limits applied in the child between fork and exec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_seconds: u64,
    pub file_size_bytes: u64,
    pub open_files: u64,
}

impl ResourceLimits {
    /// The CPU ceiling backs up the wall-clock watchdog, so it sits one
    /// second above the rounded-up timeout.
    pub fn for_execution(timeout: Duration, memory_bytes: u64) -> Self {
        let whole_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        Self {
            memory_bytes,
            cpu_seconds: whole_secs.max(1) + 1,
            file_size_bytes: FILE_SIZE_LIMIT,
            open_files: OPEN_FILES_LIMIT,
        }
    }

    /// Apply every limit to the calling process.
    ///
    /// Runs inside `pre_exec`, so it must stay async-signal-safe: no
    /// allocation, no locks, no logging.
    #[cfg(unix)]
    pub fn apply(&self) -> std::io::Result<()> {
        set_limit(libc::RLIMIT_AS, self.memory_bytes)?;
        set_limit(libc::RLIMIT_CPU, self.cpu_seconds)?;
        set_limit(libc::RLIMIT_FSIZE, self.file_size_bytes)?;
        set_limit(libc::RLIMIT_NOFILE, self.open_files)?;
        set_limit(libc::RLIMIT_CORE, 0)?;
        Ok(())
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type RlimitResource = libc::__rlimit_resource_t;
#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type RlimitResource = libc::c_int;

#[cfg(unix)]
fn set_limit(resource: RlimitResource, value: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };

    let rc = unsafe { libc::setrlimit(resource, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Kills the sandbox's whole process group when dropped, so a cancelled
/// or timed-out execution never leaves descendants running.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    /// `pid` is the group leader (the child was spawned with `process_group(0)`)
    pub fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    pub fn kill(&self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{ killpg, Signal };
            use nix::unistd::Pid;

            let Some(pgid) = self.pgid else {
                return;
            };
            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) => log::debug!("Killed sandbox process group {}", pgid),
                // Group already gone
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => log::warn!("Failed to kill sandbox process group {}: {}", pgid, e),
            }
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
