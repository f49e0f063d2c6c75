use inofs_rs::{BlockDevice, FileTable, FsResult, InodeId, ROOT_INO, VolumeFs};

/// Per-session working directory and open files. The engine never holds
/// either; every path is resolved against `cwd` explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub cwd: InodeId,
    pub path: String,
    pub files: FileTable,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            cwd: ROOT_INO,
            path: "/".to_string(),
            files: FileTable::default(),
        }
    }
}

impl Session {
    /// Moves to `path`, leaving the session untouched on error.
    pub fn change_dir<D: BlockDevice>(&mut self, fs: &VolumeFs<D>, path: &str) -> FsResult<()> {
        let dir = fs.chdir(self.cwd, path)?;
        self.path = fs.path_of(dir)?;
        self.cwd = dir;
        Ok(())
    }
}
