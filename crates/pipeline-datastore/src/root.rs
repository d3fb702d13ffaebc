//! Resolves the directory jobs are persisted under, following the same
//! priority chain as this workspace's ancestor tooling.

use std::path::PathBuf;

use directories::BaseDirs;

/// Resolution order:
/// 1. `cli_root` (a `--jobs-root` flag)
/// 2. `PIPELINE_ROOT` environment variable
/// 3. `$XDG_DATA_HOME/scanhive/jobs`
/// 4. `~/.local/share/scanhive/jobs`
pub fn resolve_root(cli_root: Option<&str>) -> PathBuf {
    if let Some(root) = cli_root {
        return PathBuf::from(root);
    }

    if let Ok(root) = std::env::var("PIPELINE_ROOT") {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }

    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("scanhive").join("jobs");
        }
    }

    if let Some(base_dirs) = BaseDirs::new() {
        let base = base_dirs.home_dir().join(".local").join("share");
        return base.join("scanhive").join("jobs");
    }

    PathBuf::from("~/.local/share/scanhive/jobs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins() {
        assert_eq!(resolve_root(Some("/tmp/my-root")), PathBuf::from("/tmp/my-root"));
    }

    #[test]
    fn env_var_wins_over_xdg() {
        // SAFETY: test-only; this crate's test binary does not run these
        // env-mutating tests in parallel with others that touch the same vars.
        unsafe {
            std::env::set_var("PIPELINE_ROOT", "/tmp/env-root");
            std::env::remove_var("XDG_DATA_HOME");
        }
        let root = resolve_root(None);
        unsafe {
            std::env::remove_var("PIPELINE_ROOT");
        }
        assert_eq!(root, PathBuf::from("/tmp/env-root"));
    }

    #[test]
    fn xdg_used_when_no_env_override() {
        unsafe {
            std::env::remove_var("PIPELINE_ROOT");
            std::env::set_var("XDG_DATA_HOME", "/tmp/xdg");
        }
        let root = resolve_root(None);
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
        assert_eq!(root, PathBuf::from("/tmp/xdg/scanhive/jobs"));
    }
}
