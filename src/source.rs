//! Trace file enumeration and atomic output files.
//!
//! A [`TraceDirectory`] walks a directory tree lazily and yields one
//! [`TraceFile`] per file with the configured extension. Calling
//! [`TraceDirectory::files`] again restarts the walk, so a batch can be
//! re-run or resumed against the same source.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::MatchError;

/// Handle to one trace file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceFile {
    /// Trace (vehicle) identifier: file name without extension.
    pub id: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// Path relative to the directory root, used to mirror outputs.
    pub relative_path: PathBuf,
}

impl TraceFile {
    /// Path of the corresponding output file under `output_root`, mirroring
    /// the input layout.
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.relative_path)
    }
}

/// A directory of trace files, walked recursively.
#[derive(Debug, Clone)]
pub struct TraceDirectory {
    root: PathBuf,
    extension: String,
}

impl TraceDirectory {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate trace files, depth-first with the entries of each
    /// directory in name order so runs are reproducible.
    pub fn files(&self) -> TraceFiles {
        TraceFiles {
            root: self.root.clone(),
            extension: self.extension.clone(),
            walker: WalkDir::new(&self.root).sort_by_file_name().into_iter(),
        }
    }
}

/// Iterator returned by [`TraceDirectory::files`].
///
/// An entry that cannot be read yields an error and the walk continues.
pub struct TraceFiles {
    root: PathBuf,
    extension: String,
    walker: walkdir::IntoIter,
}

impl TraceFiles {
    fn handle(&self, path: PathBuf) -> TraceFile {
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative_path = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        TraceFile {
            id,
            path,
            relative_path,
        }
    }

    fn is_trace(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }
}

impl Iterator for TraceFiles {
    type Item = Result<TraceFile, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_trace(entry.path()) {
                        return Some(Ok(self.handle(entry.into_path())));
                    }
                }
                Err(e) => return Some(Err(MatchError::Io(io::Error::other(e)))),
            }
        }
    }
}

/// Write `path` through a temporary sibling file that is renamed into place
/// only after `write` succeeds. On failure the temporary file is removed and
/// any previous content of `path` is left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<(), MatchError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), MatchError>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".partial");
    let tmp_path = path.with_file_name(tmp_name);

    let result = File::create(&tmp_path)
        .map_err(MatchError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&tmp_path, path).map_err(MatchError::from));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Remove `path` if it exists.
pub(crate) fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Empty `dir` of everything a previous run left in it, creating it if
/// needed.
pub(crate) fn reset_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}
