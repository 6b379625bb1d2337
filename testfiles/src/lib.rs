//! Snapshot testing over a directory of input files.
//!
//! `#[test_files(rs = ..., dir = ...)]` generates one test per input file
//! stem, passing the input and its expected-output files to the annotated
//! function. Set `UPDATE_SNAPSHOTS=true` to rewrite outdated snapshots.

use bstr::ByteSlice;
use std::env;
use std::path::{Path, PathBuf};

pub use testfiles_macros::test_files;

#[path = "rt.rs"]
pub mod __rt;

macro_rules! impl_conversions {
    ($T:ty) => {
        impl<P: Into<PathBuf>> From<P> for $T {
            fn from(path: P) -> Self {
                Self { path: path.into() }
            }
        }

        impl AsRef<Path> for $T {
            fn as_ref(&self) -> &Path {
                &self.path
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
}

impl_conversions!(InputFile);

impl InputFile {
    pub fn read_bytes(&self) -> Vec<u8> {
        std::fs::read(self)
            .unwrap_or_else(|e| panic!("Error reading {}: {}", self.path.display(), e))
    }
}

/// Expected output of a test. A missing file means "no output expected".
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
}

impl_conversions!(OutputFile);

impl OutputFile {
    /// Compares `actual` with the snapshot, creating or updating the snapshot
    /// as allowed by `mode`.
    pub fn compare_with_mode<T: Snapshot + ?Sized>(&self, actual: &T, mode: SnapshotMode) {
        match self.read_bytes_opt() {
            Some(expected) if actual.compare_with(&expected) => {}
            Some(_) if mode == SnapshotMode::All => self.write(actual),
            Some(expected) => actual.on_diff(&expected),
            None if mode >= SnapshotMode::New => self.write(actual),
            None => panic!(
                "Snapshot {} not found\n\nUse UPDATE_SNAPSHOTS=true to generate the snapshot",
                self.path.display()
            ),
        }
    }

    pub fn compare<T: Snapshot + ?Sized>(&self, actual: &T) {
        self.compare_with_mode(actual, SnapshotMode::current());
    }

    /// Checks that there is no snapshot, deleting a stale one when `mode`
    /// allows it.
    pub fn remove_with_mode(&self, mode: SnapshotMode) {
        if self.read_bytes_opt().is_none() {
            return;
        }
        if mode == SnapshotMode::All {
            std::fs::remove_file(&self.path)
                .unwrap_or_else(|e| panic!("Error removing {}: {}", self.path.display(), e));
        } else {
            panic!(
                "Snapshot {} should not exist\n\nUse UPDATE_SNAPSHOTS=true to remove the unnecessary snapshot",
                self.path.display()
            );
        }
    }

    pub fn remove(&self) {
        self.remove_with_mode(SnapshotMode::current());
    }

    /// [`OutputFile::compare`] for `Some`, [`OutputFile::remove`] for `None`.
    pub fn compare_opt<T: Snapshot>(&self, actual: &Option<T>) {
        match actual {
            Some(actual) => self.compare(actual),
            None => self.remove(),
        }
    }

    fn write<T: Snapshot + ?Sized>(&self, actual: &T) {
        std::fs::write(self, actual.to_snapshot())
            .unwrap_or_else(|e| panic!("Error writing {}: {}", self.path.display(), e));
    }

    fn read_bytes_opt(&self) -> Option<Vec<u8>> {
        match std::fs::read(self) {
            Ok(expected) => Some(expected),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => panic!("Error reading {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SnapshotMode {
    /// Never write snapshots
    None,
    /// Write missing snapshots only
    New,
    /// Rewrite every outdated snapshot
    All,
}

impl SnapshotMode {
    /// Reads `UPDATE_SNAPSHOTS`; defaults to `New`, or `None` on CI.
    pub fn current() -> SnapshotMode {
        match env::var("UPDATE_SNAPSHOTS").as_deref() {
            Ok("all" | "true" | "1") => return SnapshotMode::All,
            Ok("new") => return SnapshotMode::New,
            Ok("none" | "false" | "0") => return SnapshotMode::None,
            _ => {}
        }
        match env::var("CI").as_deref() {
            Ok("true" | "1") => SnapshotMode::None,
            _ => SnapshotMode::New,
        }
    }
}

pub trait Snapshot {
    fn to_snapshot(&self) -> Vec<u8>;
    fn compare_with(&self, snapshot: &[u8]) -> bool;
    fn on_diff(&self, snapshot: &[u8]) -> !;
}

impl Snapshot for str {
    fn to_snapshot(&self) -> Vec<u8> {
        self.as_bytes().to_owned()
    }
    fn compare_with(&self, snapshot: &[u8]) -> bool {
        self.as_bytes() == snapshot
    }
    fn on_diff(&self, snapshot: &[u8]) -> ! {
        assert_eq!(self, snapshot.as_bstr());
        unreachable!();
    }
}

impl Snapshot for String {
    fn to_snapshot(&self) -> Vec<u8> {
        self.as_str().to_snapshot()
    }
    fn compare_with(&self, snapshot: &[u8]) -> bool {
        self.as_str().compare_with(snapshot)
    }
    fn on_diff(&self, snapshot: &[u8]) -> ! {
        self.as_str().on_diff(snapshot)
    }
}
