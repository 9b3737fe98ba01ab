//! Manifest discovery and per-user directories

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable naming the manifest file directly
pub const CONFIG_ENV: &str = "IBMFORM_CONFIG";

/// Directory holding state and lock files, relative to the project root
pub const STATE_DIR: &str = ".ibmform";

const MANIFEST_NAMES: [&str; 2] = ["main.kdl", "ibmform.kdl"];

/// `~/.config/ibmform`, created if missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("ibmform");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the manifest to operate on
///
/// Search order:
/// 1. `IBMFORM_CONFIG`
/// 2. `./main.kdl`, then `./ibmform.kdl`
/// 3. `./.ibmform/main.kdl`
/// 4. `~/.config/ibmform/main.kdl`
pub fn find_manifest() -> Result<PathBuf> {
    if let Ok(configured) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(&configured);
        if path.exists() {
            tracing::debug!("Using manifest from {}: {}", CONFIG_ENV, path.display());
            return Ok(path);
        }
        return Err(ConfigError::ConfiguredPathMissing(configured));
    }

    let current_dir = std::env::current_dir()?;
    for name in MANIFEST_NAMES {
        let path = current_dir.join(name);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(STATE_DIR).join("main.kdl");
    if project_dir.exists() {
        return Ok(project_dir);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("ibmform").join("main.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ManifestNotFound)
}

/// Directory state is kept under for a given manifest
///
/// A manifest inside `.ibmform/` belongs to the directory containing it.
pub fn project_root(manifest: &Path) -> PathBuf {
    let dir = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if dir.file_name().is_some_and(|name| name == STATE_DIR) {
        if let Some(parent) = dir.parent() {
            return parent.to_path_buf();
        }
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Run `f` with the working directory set to `dir`
    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = f();
        std::env::set_current_dir(original).unwrap();
        result
    }

    #[test]
    #[serial]
    fn test_get_config_dir() {
        let home = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some(home.path().to_str().unwrap())),
                ("HOME", Some(home.path().to_str().unwrap())),
            ],
            || {
                let config_dir = get_config_dir().unwrap();
                assert!(config_dir.ends_with("ibmform"));
                assert!(config_dir.exists());
            },
        );
    }

    #[test]
    #[serial]
    fn test_find_manifest_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("main.kdl"), "// test").unwrap();

        let found = temp_env::with_var_unset(CONFIG_ENV, || in_dir(temp_dir.path(), find_manifest));
        assert!(found.unwrap().ends_with("main.kdl"));
    }

    #[test]
    #[serial]
    fn test_main_kdl_wins_over_ibmform_kdl() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("ibmform.kdl"), "// alt").unwrap();

        let found = temp_env::with_var_unset(CONFIG_ENV, || in_dir(temp_dir.path(), find_manifest));
        assert!(found.unwrap().ends_with("ibmform.kdl"));

        fs::write(temp_dir.path().join("main.kdl"), "// main").unwrap();
        let found = temp_env::with_var_unset(CONFIG_ENV, || in_dir(temp_dir.path(), find_manifest));
        assert!(found.unwrap().ends_with("main.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_manifest_in_state_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join(STATE_DIR);
        fs::create_dir(&project).unwrap();
        fs::write(project.join("main.kdl"), "// project").unwrap();

        let found = temp_env::with_var_unset(CONFIG_ENV, || in_dir(temp_dir.path(), find_manifest));
        assert!(found.unwrap().ends_with(".ibmform/main.kdl"));
    }

    #[test]
    #[serial]
    fn test_env_var_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("custom.kdl");
        fs::write(&custom, "// custom").unwrap();
        fs::write(temp_dir.path().join("main.kdl"), "// main").unwrap();

        let found = temp_env::with_var(CONFIG_ENV, Some(custom.to_str().unwrap()), || {
            in_dir(temp_dir.path(), find_manifest)
        });
        assert_eq!(found.unwrap(), custom);
    }

    #[test]
    #[serial]
    fn test_env_var_to_missing_file_is_error() {
        let found = temp_env::with_var(CONFIG_ENV, Some("/nonexistent/ibmform.kdl"), find_manifest);
        assert!(matches!(found, Err(ConfigError::ConfiguredPathMissing(_))));
    }

    #[test]
    #[serial]
    fn test_manifest_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();

        let found = temp_env::with_vars(
            [
                (CONFIG_ENV, None),
                ("XDG_CONFIG_HOME", Some(home.path().to_str().unwrap())),
                ("HOME", Some(home.path().to_str().unwrap())),
            ],
            || in_dir(temp_dir.path(), find_manifest),
        );
        assert!(matches!(found, Err(ConfigError::ManifestNotFound)));
    }

    #[test]
    fn test_project_root() {
        assert_eq!(project_root(Path::new("/work/net/main.kdl")), PathBuf::from("/work/net"));
        assert_eq!(
            project_root(Path::new("/work/net/.ibmform/main.kdl")),
            PathBuf::from("/work/net")
        );
        assert_eq!(project_root(Path::new("main.kdl")), PathBuf::from("."));
    }
}
