//! Kernel-level containment for the sandbox child.
//!
//! On Linux the child enters fresh user, mount and network namespaces
//! before exec. Every inherited mount is remounted read-only except a bind
//! mount of the workspace, and the network namespace has no interfaces up.
//! `no_new_privs` is set regardless. Hosts that refuse unprivileged
//! namespaces run without them and report `namespace_isolated = false`.

use once_cell::sync::Lazy;

static NAMESPACES_AVAILABLE: Lazy<bool> = Lazy::new(detect);

/// True when the kernel lets this process build the sandbox namespaces
pub fn namespaces_available() -> bool {
    *NAMESPACES_AVAILABLE
}

#[cfg(not(target_os = "linux"))]
fn detect() -> bool {
    false
}

#[cfg(target_os = "linux")]
pub use imp::{ for_workspace, parse_mountinfo, set_no_new_privs, Containment };

#[cfg(target_os = "linux")]
use imp::detect;

#[cfg(target_os = "linux")]
mod imp {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    use log::{ debug, warn };

    use super::namespaces_available;

    const UNSHARE_FLAGS: libc::c_int = libc::CLONE_NEWUSER | libc::CLONE_NEWNS | libc::CLONE_NEWNET;
    const ROOT: &[u8] = b"/\0";

    /// Mount table snapshot taken in the parent. Entering it in the child
    /// only issues syscalls on these prebuilt strings.
    #[derive(Debug)]
    pub struct Containment {
        workspace: CString,
        read_only: Vec<(CString, libc::c_ulong)>,
    }

    impl Containment {
        pub fn prepare(workspace: &Path) -> io::Result<Self> {
            let workspace = CString::new(workspace.as_os_str().as_bytes()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "workspace path contains a NUL byte")
            })?;
            let mountinfo = std::fs::read_to_string("/proc/self/mountinfo")?;
            Ok(Self { workspace, read_only: parse_mountinfo(&mountinfo) })
        }

        /// Runs in the forked child before exec, so async-signal-safe calls only
        pub fn enter(&self) -> io::Result<()> {
            check(unsafe { libc::unshare(UNSHARE_FLAGS) })?;
            // Keep every change below out of the host's mount table
            check(unsafe {
                libc::mount(
                    std::ptr::null(),
                    ROOT.as_ptr() as *const libc::c_char,
                    std::ptr::null(),
                    libc::MS_REC | libc::MS_PRIVATE,
                    std::ptr::null()
                )
            })?;
            check(unsafe {
                libc::mount(
                    self.workspace.as_ptr(),
                    self.workspace.as_ptr(),
                    std::ptr::null(),
                    libc::MS_BIND | libc::MS_REC,
                    std::ptr::null()
                )
            })?;
            for (target, flags) in &self.read_only {
                let remounted = check(unsafe {
                    libc::mount(
                        std::ptr::null(),
                        target.as_ptr(),
                        std::ptr::null(),
                        libc::MS_REMOUNT | libc::MS_BIND | libc::MS_RDONLY | *flags,
                        std::ptr::null()
                    )
                });
                match remounted {
                    // Shadowed by a later mount, so unreachable anyway
                    Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {}
                    other => other?,
                }
            }
            // The inherited cwd still points below the read-only mount
            check(unsafe { libc::chdir(self.workspace.as_ptr()) })
        }
    }

    /// Containment for one execution, when enabled and the host supports it
    pub fn for_workspace(workspace: &Path, enabled: bool) -> io::Result<Option<Containment>> {
        if !enabled || !namespaces_available() {
            return Ok(None);
        }
        Containment::prepare(workspace).map(Some)
    }

    pub fn set_no_new_privs() -> io::Result<()> {
        check(unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) })
    }

    fn check(rc: libc::c_int) -> io::Result<()> {
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    /// Writable mount points with the per-mount flags a remount must keep.
    ///
    /// Mounts inherited into a user namespace are locked, so a remount that
    /// drops one of these flags is refused. When a path is mounted more than
    /// once only the topmost (last listed) entry is reachable. Automount
    /// points are left alone, since touching them mounts them.
    pub fn parse_mountinfo(mountinfo: &str) -> Vec<(CString, libc::c_ulong)> {
        let mut mounts: Vec<(CString, Option<libc::c_ulong>)> = Vec::new();

        for line in mountinfo.lines() {
            let fstype = line.split(" - ").nth(1).and_then(|rest| rest.split(' ').next());
            if fstype == Some("autofs") {
                continue;
            }
            let mut fields = line.split(' ');
            let (Some(target), Some(options)) = (fields.nth(4), fields.next()) else {
                continue;
            };
            let Ok(target) = CString::new(unescape(target)) else {
                continue;
            };

            let mut flags: Option<libc::c_ulong> = Some(0);
            for option in options.split(',') {
                let bit = match option {
                    "ro" => {
                        flags = None;
                        break;
                    }
                    "nosuid" => libc::MS_NOSUID,
                    "nodev" => libc::MS_NODEV,
                    "noexec" => libc::MS_NOEXEC,
                    "noatime" => libc::MS_NOATIME,
                    "nodiratime" => libc::MS_NODIRATIME,
                    "relatime" => libc::MS_RELATIME,
                    "strictatime" => libc::MS_STRICTATIME,
                    _ => 0,
                };
                flags = flags.map(|f| f | bit);
            }

            mounts.retain(|(existing, _)| existing != &target);
            mounts.push((target, flags));
        }

        mounts
            .into_iter()
            .filter_map(|(target, flags)| flags.map(|flags| (target, flags)))
            .collect()
    }

    /// Mount points escape space, tab, newline and backslash as `\ooo`
    fn unescape(field: &str) -> Vec<u8> {
        let bytes = field.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let octal = bytes.get(i + 1..i + 4).filter(|digits| digits.iter().all(|b| (b'0'..=b'7').contains(b)));
            match octal {
                Some(digits) if bytes[i] == b'\\' => {
                    let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                    out.push(value as u8);
                    i += 4;
                }
                _ => {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
        }
        out
    }

    /// Try the whole sequence once in a throwaway child
    pub fn detect() -> bool {
        use nix::sys::wait::{ waitpid, WaitStatus };
        use nix::unistd::{ fork, ForkResult };

        if std::fs::read_dir("/proc/self/ns").is_err() {
            return false;
        }
        let containment = match Containment::prepare(&std::env::temp_dir()) {
            Ok(containment) => containment,
            Err(e) => {
                warn!("Cannot read the mount table, sandbox runs without namespaces: {}", e);
                return false;
            }
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let code = if containment.enter().is_ok() { 0 } else { 1 };
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                let available = matches!(waitpid(child, None), Ok(WaitStatus::Exited(_, 0)));
                if available {
                    debug!("User, mount and network namespaces are available to the sandbox");
                } else {
                    warn!(
                        "Namespaces are unavailable: sandboxed code keeps host filesystem and network access"
                    );
                }
                available
            }
            Err(e) => {
                warn!("Failed to fork the namespace check: {}", e);
                false
            }
        }
    }
}
