// files.rs -- directory search path for script files and demos
//
// Archive (pak) lookup belongs to another layer; this only searches plain
// directories, most recently added first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::qcommon::BASEDIRNAME;

#[derive(Debug, Clone)]
pub struct FsContext {
    /// Directory demos and config.cfg are written to.
    pub gamedir: PathBuf,
    /// Read search order, highest priority first.
    pub search_paths: Vec<PathBuf>,
}

impl Default for FsContext {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}

impl FsContext {
    /// Search `<basedir>/base` only.
    pub fn new(basedir: &Path) -> Self {
        let gamedir = basedir.join(BASEDIRNAME);
        Self {
            search_paths: vec![gamedir.clone()],
            gamedir,
        }
    }

    /// Add `<basedir>/<dir>` ahead of the existing search paths and make it
    /// the write directory.
    pub fn add_game_directory(&mut self, dir: &Path) {
        self.search_paths.insert(0, dir.to_path_buf());
        self.gamedir = dir.to_path_buf();
    }

    /// Resolve `name` against the search paths.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|p| p.is_file())
    }

    pub fn load_file(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.find_file(name)?;
        match fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "FS_LoadFile: read error");
                None
            }
        }
    }

    /// Path under the write directory.
    pub fn gamedir_path(&self, name: &str) -> PathBuf {
        self.gamedir.join(name)
    }

    /// Create any directories needed to write `path`.
    pub fn create_path(path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}
