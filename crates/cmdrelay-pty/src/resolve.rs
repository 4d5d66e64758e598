//! Executable resolution for spawned programs.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Resolve an executable by name.
///
/// The search order is:
/// 1. Explicit paths (absolute or containing a separator), used if they exist.
/// 2. The current process PATH via `which`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    let executable = executable.trim();
    if executable.is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() || executable.contains(MAIN_SEPARATOR) {
        return path.is_file().then(|| path.to_path_buf());
    }

    which_async(executable).await
}

async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_from_path() {
        let sh = resolve_executable_path("sh").await.expect("sh on PATH");
        assert!(sh.is_absolute());
    }

    #[tokio::test]
    async fn test_explicit_path_must_exist() {
        assert_eq!(
            resolve_executable_path("/bin/sh").await,
            Some(PathBuf::from("/bin/sh"))
        );
        assert_eq!(resolve_executable_path("/definitely/not/here").await, None);
        assert_eq!(resolve_executable_path("  ").await, None);
    }

    #[tokio::test]
    async fn test_unknown_name_is_none() {
        assert_eq!(
            resolve_executable_path("cmdrelay-no-such-program-xyz").await,
            None
        );
    }
}
