use std::path::{Path, PathBuf};

/// Directory created under the host's persistent data path.
pub const SAVE_ROOT_DIR: &str = "Mod_IndependentStash";
pub const SAVE_FILE_NAME: &str = "MyStash.sav";
pub const BACKUP_SUFFIX: &str = ".backup";
pub const CONFIG_FILE_NAME: &str = "IndependentStash.cfg";

/// Every on-disk location the stash touches, derived from one base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashPaths {
    pub root: PathBuf,
    pub save_file: PathBuf,
    pub backup_file: PathBuf,
    pub config_file: PathBuf,
}

impl StashPaths {
    pub fn new(base: &Path) -> Self {
        let root = base.join(SAVE_ROOT_DIR);
        let save_file = root.join(SAVE_FILE_NAME);
        Self {
            backup_file: backup_path_for(&save_file),
            config_file: root.join(CONFIG_FILE_NAME),
            save_file,
            root,
        }
    }
}

/// `MyStash.sav` -> `MyStash.sav.backup`
pub fn backup_path_for(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}
