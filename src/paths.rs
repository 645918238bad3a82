//! XDG-compliant path resolution for tropedb.
//!
//! Provides `TropePaths`: where the settings file and the default catalog
//! database live, following the XDG Base Directory Specification.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// File name of the default catalog database under the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "genre_tropes.db";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(tropedb::paths::no_home),
        help("Set the HOME environment variable or pass --database and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(tropedb::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for tropedb.
#[derive(Debug, Clone)]
pub struct TropePaths {
    /// `$XDG_CONFIG_HOME/tropedb/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/tropedb/`
    pub data_dir: PathBuf,
}

impl TropePaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary variable lookup.
    ///
    /// Tests use this instead of mutating the process environment, which is
    /// unsafe in edition 2024.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> PathResult<Self> {
        let home = lookup("HOME").map(PathBuf::from).ok_or(PathError::NoHome)?;

        let config_dir = lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".config"))
            .join("tropedb");

        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/share"))
            .join("tropedb");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Create the base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the settings file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path to the default catalog database.
    pub fn default_database(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DATABASE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn falls_back_to_home_layout() {
        let paths = TropePaths::resolve_with(lookup(&[("HOME", "/home/reader")])).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/reader/.config/tropedb"));
        assert_eq!(
            paths.data_dir,
            PathBuf::from("/home/reader/.local/share/tropedb")
        );
        assert_eq!(
            paths.default_database(),
            PathBuf::from("/home/reader/.local/share/tropedb/genre_tropes.db")
        );
    }

    #[test]
    fn xdg_overrides_win() {
        let paths = TropePaths::resolve_with(lookup(&[
            ("HOME", "/home/reader"),
            ("XDG_CONFIG_HOME", "/cfg"),
            ("XDG_DATA_HOME", "/data"),
        ]))
        .unwrap();
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/tropedb/config.toml"));
        assert_eq!(paths.data_dir, PathBuf::from("/data/tropedb"));
    }

    #[test]
    fn missing_home_is_an_error() {
        let result = TropePaths::resolve_with(lookup(&[]));
        assert!(matches!(result, Err(PathError::NoHome)));
    }

    #[test]
    fn ensure_dirs_creates_both() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = TropePaths {
            config_dir: dir.path().join("cfg"),
            data_dir: dir.path().join("data"),
        };
        paths.ensure_dirs().unwrap();
        assert!(paths.config_dir.is_dir());
        assert!(paths.data_dir.is_dir());
    }
}
