//! Crash-safe replacement of container files.
//!
//! A container is never edited in place. Every rewrite is staged into a
//! hidden sibling, synced, and swapped over the target in one step, so a
//! reader sees either the old container or the new one.

use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SealError};

/// A container file on disk that is only ever replaced whole.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current container size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn open(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file with whatever `write` produces.
    ///
    /// `write` gets a freshly created staging file next to the target. Once
    /// it returns `Ok` the staging file is synced and swapped into place, and
    /// the directory entry is synced too. Missing parent directories are
    /// created. On any error the staging file is removed and the previous
    /// content stays as it was.
    pub fn save_with<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        let dir = self.parent();
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let staging = self.staging_path()?;
        if let Err(e) = self.stage(&staging, write).and_then(|()| self.commit(&staging)) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        debug!(path = %self.path.display(), "container replaced");

        if let Some(dir) = dir {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    fn stage<F>(&self, staging: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        // create_new: never reuse a leftover path
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)?;
        write(&mut file)?;
        file.sync_all()?;
        Ok(())
    }

    fn parent(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// `.<file name>.sealpad-<16 hex digits>` beside the target.
    fn staging_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            SealError::config(format!("{} does not name a file", self.path.display()))
        })?;

        let mut nonce = [0u8; 8];
        fill(&mut nonce)
            .map_err(|e| io::Error::other(format!("OS random generator unavailable: {e}")))?;
        let suffix: String = nonce.iter().map(|b| format!("{b:02x}")).collect();

        Ok(self
            .path
            .with_file_name(format!(".{}.sealpad-{suffix}", name.to_string_lossy())))
    }

    /// Swaps `staging` over the target. A missing target is a plain rename;
    /// an existing one goes through `ReplaceFileW` with write-through.
    #[cfg(target_os = "windows")]
    fn commit(&self, staging: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(staging, &self.path)?;
            return Ok(());
        }

        fn wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(Some(0)).collect()
        }
        let target = wide(self.path.as_os_str());
        let replacement = wide(staging.as_os_str());

        // SAFETY: both buffers are NUL-terminated UTF-16 that outlive the
        // call, and the optional pointers are null.
        let ok = unsafe {
            ReplaceFileW(
                target.as_ptr(),
                replacement.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// `rename` is atomic within one file system, and the staging file is a
    /// sibling of the target.
    #[cfg(not(target_os = "windows"))]
    fn commit(&self, staging: &Path) -> Result<()> {
        fs::rename(staging, &self.path)?;
        Ok(())
    }
}
