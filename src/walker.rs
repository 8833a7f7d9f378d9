/*!
 * Directory traversal for candidate files
 */

use std::path::{self, Path, PathBuf};

use glob_match::glob_match;
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{AuditError, Result};

/// Filenames generated by the OS or by editors that are never user content
pub static DEFAULT_TRANSIENT: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Thumbnail caches
        "Thumbs.db",
        "ehthumbs.db",
        "ehthumbs_vista.db",
        ".DS_Store",
        "desktop.ini",
        // Office owner/lock files
        "~$*",
        // LibreOffice lock files
        ".~lock.*#",
    ]
});

/// Filename patterns excluded from every walk
#[derive(Debug, Clone)]
pub struct TransientFilter {
    patterns: Vec<String>,
}

impl Default for TransientFilter {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_TRANSIENT.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl TransientFilter {
    /// Defaults plus extra patterns
    pub fn with_patterns<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::default();
        filter.patterns.extend(extra.into_iter().map(Into::into));
        filter
    }

    /// Check a file name against the transient set
    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| glob_match(pattern, file_name))
    }
}

/// Produces the files to audit under a root directory
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    recursive: bool,
    filter: TransientFilter,
}

impl Walker {
    /// Create a walker, failing if `root` is not an existing directory.
    ///
    /// The root is made absolute but not resolved: symlinks, drive letters and
    /// UNC shares stay spelled the way the caller gave them.
    pub fn new(root: &Path, recursive: bool, filter: TransientFilter) -> Result<Self> {
        if !root.is_dir() {
            return Err(AuditError::InvalidRoot(root.to_path_buf()));
        }
        let root = path::absolute(root).map_err(|_| AuditError::InvalidRoot(root.to_path_buf()))?;

        Ok(Self {
            root,
            recursive,
            filter,
        })
    }

    /// Absolute scan root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether subdirectories are visited
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Count files for progress tracking.
    ///
    /// In recursive mode this is a full pass over the tree; otherwise it is a
    /// single listing of the root.
    pub fn count(&self) -> u64 {
        let count = self.files().filter(|entry| entry.is_ok()).count() as u64;
        debug!(root = %self.root.display(), count, "counted files");
        count
    }

    /// Lazily iterate over the files to audit.
    ///
    /// Entries that cannot be read are yielded as filesystem errors so the
    /// caller can skip them and continue.
    pub fn files(&self) -> WalkFiles {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        WalkFiles {
            inner: WalkDir::new(&self.root)
                .min_depth(1)
                .max_depth(max_depth)
                .into_iter(),
            filter: self.filter.clone(),
        }
    }
}

/// Iterator over audit candidates, see [`Walker::files`]
pub struct WalkFiles {
    inner: walkdir::IntoIter,
    filter: TransientFilter,
}

impl WalkFiles {
    fn accept(&self, entry: &DirEntry) -> bool {
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            return false;
        }

        let file_name = entry.file_name().to_string_lossy();
        if self.filter.matches(&file_name) {
            debug!(path = %entry.path().display(), "skipping transient artifact");
            return false;
        }
        true
    }
}

impl Iterator for WalkFiles {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if self.accept(&entry) {
                        return Some(Ok(entry.into_path()));
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), error = %e, "unreadable entry");
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                    return Some(Err(AuditError::Filesystem { path, source }));
                }
            }
        }
    }
}
