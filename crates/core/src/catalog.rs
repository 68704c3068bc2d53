use crate::error::IndexError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_INDEX_PREFIX: &str = "index";
pub const UPLOADED_INDEX_PREFIX: &str = "uploaded_index";

#[derive(Debug)]
pub struct IndexCatalog {
    root: PathBuf,
    // Keeps a fallback directory alive for the catalog's lifetime.
    _fallback: Option<tempfile::TempDir>,
}

impl IndexCatalog {
    /// Creates `root` if needed. A root that cannot be created for lack of
    /// permissions is replaced by a temporary directory.
    pub fn open(root: &Path) -> Result<Self, IndexError> {
        match fs::create_dir_all(root) {
            Ok(()) => {
                info!(root = %root.display(), "using index directory");
                Ok(Self {
                    root: root.to_path_buf(),
                    _fallback: None,
                })
            }
            Err(error) if error.kind() == ErrorKind::PermissionDenied => {
                let fallback = tempfile::Builder::new().prefix("indexes_").tempdir()?;
                warn!(
                    root = %root.display(),
                    fallback = %fallback.path().display(),
                    "index directory not writable; falling back to a temporary directory"
                );
                Ok(Self {
                    root: fallback.path().to_path_buf(),
                    _fallback: Some(fallback),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list(&self) -> Result<Vec<String>, IndexError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// `<prefix>_<n>` where `n` is one more than the number of existing indexes,
    /// skipping ahead if that name is taken.
    pub fn next_name(&self, prefix: &str) -> Result<String, IndexError> {
        let existing = self.list()?;
        let mut number = existing.len() + 1;
        loop {
            let candidate = format!("{prefix}_{number}");
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
            number += 1;
        }
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, IndexError> {
        validate_name(name)?;
        Ok(self.root.join(name.trim()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).map(|path| path.is_dir()).unwrap_or(false)
    }
}

fn validate_name(name: &str) -> Result<(), IndexError> {
    let trimmed = name.trim();
    let mut components = Path::new(trimmed).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();

    if trimmed.is_empty() || !single_normal || trimmed.contains(&['/', '\\'][..]) {
        return Err(IndexError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_root() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("indexes");
        let catalog = IndexCatalog::open(&root)?;

        assert!(root.is_dir());
        assert_eq!(catalog.root(), root.as_path());
        assert!(catalog.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn list_returns_only_directories_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let catalog = IndexCatalog::open(dir.path())?;
        fs::create_dir(dir.path().join("zeta"))?;
        fs::create_dir(dir.path().join("alpha"))?;
        fs::write(dir.path().join("alpha.zip"), b"zip")?;

        assert_eq!(catalog.list()?, vec!["alpha", "zeta"]);
        assert!(catalog.contains("alpha"));
        assert!(!catalog.contains("alpha.zip"));
        Ok(())
    }

    #[test]
    fn next_name_counts_existing_indexes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let catalog = IndexCatalog::open(dir.path())?;
        assert_eq!(catalog.next_name(DEFAULT_INDEX_PREFIX)?, "index_1");

        fs::create_dir(dir.path().join("manual"))?;
        fs::create_dir(dir.path().join("index_2"))?;
        assert_eq!(catalog.next_name(DEFAULT_INDEX_PREFIX)?, "index_3");
        assert_eq!(catalog.next_name(UPLOADED_INDEX_PREFIX)?, "uploaded_index_3");

        fs::create_dir(dir.path().join("index_3"))?;
        fs::create_dir(dir.path().join("index_4"))?;
        assert_eq!(catalog.next_name(DEFAULT_INDEX_PREFIX)?, "index_5");
        Ok(())
    }

    #[test]
    fn names_must_stay_inside_the_root() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let catalog = IndexCatalog::open(dir.path())?;

        for bad in ["", "   ", "..", ".", "a/b", "../escape", "/abs", "a\\b"] {
            assert!(
                matches!(catalog.path_for(bad), Err(IndexError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(catalog.path_for(" manual ")?, dir.path().join("manual"));
        Ok(())
    }
}
