use crate::store::validate_group;
use crate::utils::error::{Result, RiptError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read a rule fragment: one rule per line, blank lines dropped, order kept.
pub fn load_fragment(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RiptError::NotFound(format!("rule fragment {}", path.display())),
        _ => RiptError::Io(e),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect())
}

/// The directory holding the header, footer and group fragments.
#[derive(Debug, Clone)]
pub struct FragmentDir {
    root: PathBuf,
}

impl FragmentDir {
    pub fn new(root: &Path) -> Self {
        FragmentDir {
            root: root.to_path_buf(),
        }
    }

    /// Names are file names inside the directory, never paths.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_group(name)?;
        Ok(self.root.join(name))
    }

    pub fn load(&self, name: &str) -> Result<Vec<String>> {
        load_fragment(&self.path_for(name)?)
    }
}
