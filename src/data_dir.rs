use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    language::Language,
};

pub const DATA_DIR_ENV_VAR: &str = "DOCRAG_DATA_DIR";

/// Config file names looked up in the data directory, first match wins.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["config_local.toml", "config.toml"];

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The DOCRAG_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/docrag/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(DATA_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("docrag")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_candidates(&self) -> Vec<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .collect()
    }

    /// Directory holding the persisted index for one language.
    pub fn index_dir(&self, language: &Language) -> Result<PathBuf> {
        let path = self.root.join("index").join(language.as_str());
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::DataDir(path.clone()))?;
        Ok(path)
    }
}
