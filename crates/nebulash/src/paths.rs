//! Resolves where nebulash looks for its configuration file.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "NEBULASH_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "nebulash";
const APPLICATION: &str = "nebulash";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// `NEBULASH_CONFIG_DIR` wins over the platform config directory.
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir: dir });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn from_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }
}

fn env_override(key: &str) -> Option<PathBuf> {
    let value = env::var_os(key)?;
    if value.is_empty() {
        return None;
    }
    Some(expand_home(PathBuf::from(value)))
}

fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_config_dir() {
        let paths = AppPaths::from_config_dir("/tmp/nebulash-test");
        assert_eq!(paths.config_dir(), Path::new("/tmp/nebulash-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/nebulash-test/config.toml")
        );
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        let path = PathBuf::from("/etc/nebulash");
        assert_eq!(expand_home(path.clone()), path);
    }
}
