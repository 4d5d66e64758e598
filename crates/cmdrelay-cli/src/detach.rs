//! Background re-launch.

use std::{
    ffi::{OsStr, OsString},
    process::{Command, Stdio},
};

use anyhow::Context as _;
use command_group::CommandGroup;

const BACKEND_FLAG: &str = "--backend";

/// Arguments for the detached copy: everything but `--backend`.
pub fn forwarded_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .filter(|arg| arg.as_os_str() != OsStr::new(BACKEND_FLAG))
        .collect()
}

/// Re-run this executable in its own process group with stdio detached.
/// Returns the child's pid; the child is not waited on.
pub fn spawn_detached() -> anyhow::Result<u32> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let child = Command::new(&exe)
        .args(forwarded_args(std::env::args_os().skip(1)))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .group_spawn()
        .with_context(|| format!("cannot start {} in the background", exe.display()))?;
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_backend_flag_is_dropped() {
        let args = ["--backend", "--command", "e30=", "--log-dir", "/var/log/x"]
            .map(OsString::from);
        assert_eq!(
            forwarded_args(args),
            ["--command", "e30=", "--log-dir", "/var/log/x"].map(OsString::from)
        );
    }
}
