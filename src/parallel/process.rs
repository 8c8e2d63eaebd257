/// Kill every process in the group led by `pid` (Unix).
///
/// Sends SIGKILL to the process group whose id equals `pid`. Only valid for
/// children spawned with [`CommandSpec::process_group`](crate::parallel::command::CommandSpec::process_group).
///
/// # Errors
///
/// Returns an error if:
/// - `pid` is 0 or does not fit in a `pid_t`
/// - the process group does not exist
/// - permission is denied
#[cfg(all(unix, feature = "process-group"))]
pub(crate) fn kill_process_group(pid: u32) -> Result<(), std::io::Error> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if pid == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Invalid PID: 0",
        ));
    }

    let pid_i32 = match i32::try_from(pid) {
        Ok(p) => p,
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("PID {} is too large for this system", pid),
            ));
        }
    };

    match killpg(Pid::from_raw(pid_i32), Signal::SIGKILL) {
        Ok(_) => Ok(()),
        Err(Errno::ESRCH) => Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Process group {} does not exist", pid),
        )),
        Err(Errno::EPERM) => Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("Permission denied to kill process group {}", pid),
        )),
        Err(e) => Err(std::io::Error::other(format!(
            "Failed to send SIGKILL to process group {}: {}",
            pid, e
        ))),
    }
}
