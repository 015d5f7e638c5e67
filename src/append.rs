//! Appending text to a container by rewriting it.
//!
//! The existing plaintext is materialized into a [`Scratch`] buffer, the new
//! line is appended there, and the whole buffer is encrypted onto the target
//! through [`Storage::save_with`]. Strategies differ only in where the
//! plaintext lives meanwhile: memory, or a temporary file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::encoding::TextEncoding;
use crate::error::{Result, SealError};
use crate::pipeline::{Decryptor, Encryptor};
use crate::settings::Settings;
use crate::storage::Storage;

pub(crate) trait Scratch {
    /// Where plaintext is written: existing content first, then the new line.
    fn writer(&mut self) -> &mut dyn Write;

    /// Streams the accumulated plaintext into `out`.
    fn replay(&mut self, out: &mut dyn Write) -> Result<u64>;

    /// Drops the plaintext.
    fn discard(self) -> Result<()>;
}

/// Keeps plaintext in memory; nothing unencrypted touches the disk.
pub(crate) struct MemoryScratch {
    buf: Zeroizing<Vec<u8>>,
}

impl MemoryScratch {
    /// Compressed content usually inflates, so size for 1.5 times the
    /// container plus the new text.
    pub(crate) fn for_append(container_len: u64, text_len: usize) -> Self {
        let estimate = (container_len as usize).saturating_mul(3) / 2 + text_len;
        Self {
            buf: Zeroizing::new(Vec::with_capacity(estimate)),
        }
    }
}

impl Scratch for MemoryScratch {
    fn writer(&mut self) -> &mut dyn Write {
        &mut *self.buf
    }

    fn replay(&mut self, out: &mut dyn Write) -> Result<u64> {
        out.write_all(&self.buf)?;
        Ok(self.buf.len() as u64)
    }

    fn discard(self) -> Result<()> {
        Ok(())
    }
}

/// Keeps plaintext in a temporary file, bounding memory use. The file is
/// removed on [`Scratch::discard`] or, failing that, on drop.
pub(crate) struct TempFileScratch {
    file: NamedTempFile,
}

impl TempFileScratch {
    pub(crate) fn create_in(dir: &TempDirectory) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(".sealpad-")
            .suffix(".tmp")
            .tempfile_in(dir.path())?;
        debug!(path = %file.path().display(), "plaintext scratch file created");
        Ok(Self { file })
    }
}

impl Scratch for TempFileScratch {
    fn writer(&mut self) -> &mut dyn Write {
        self.file.as_file_mut()
    }

    fn replay(&mut self, out: &mut dyn Write) -> Result<u64> {
        let file: &mut File = self.file.as_file_mut();
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(io::copy(&mut BufReader::new(file), out)?)
    }

    fn discard(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

/// Scratch directory that is known not to be the target's own directory.
#[derive(Debug, Clone)]
pub struct TempDirectory {
    path: PathBuf,
}

impl TempDirectory {
    /// Checks `temp_dir` against the directory holding `target`. Paths are
    /// compared lexically after making them absolute; the file system is not
    /// touched.
    pub fn for_target(temp_dir: &Path, target: &Path) -> Result<Self> {
        let target_dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        if std::path::absolute(temp_dir)? == std::path::absolute(target_dir)? {
            return Err(SealError::config(format!(
                "temporary directory {} must differ from the directory of {}",
                temp_dir.display(),
                target.display()
            )));
        }

        Ok(Self {
            path: temp_dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Materialize existing plaintext, append one line, re-encrypt.
pub(crate) fn append_with<S: Scratch>(
    mut scratch: S,
    storage: &Storage,
    text: &str,
    password: &str,
    encoding: TextEncoding,
    settings: &Settings,
) -> Result<()> {
    let mut existing = 0;
    if storage.exists() {
        let input = BufReader::new(storage.open()?);
        let mut decryptor = Decryptor::new(input, password, settings)?;
        existing = decryptor.decrypt_to(scratch.writer())?;
        decryptor.close()?;
    }
    debug!(existing, "existing plaintext materialized");

    encoding.write_line(scratch.writer(), text, existing == 0)?;

    storage.save_with(|file| {
        let mut encryptor = Encryptor::new(BufWriter::new(file), password, settings)?;
        scratch.replay(&mut encryptor)?;
        encryptor.close()?.flush()?;
        Ok(())
    })?;

    scratch.discard()
}

/// In-memory strategy.
pub(crate) fn append_in_memory(
    storage: &Storage,
    text: &str,
    password: &str,
    encoding: TextEncoding,
    settings: &Settings,
) -> Result<()> {
    precheck(password, settings)?;
    let container_len = if storage.exists() { storage.size()? } else { 0 };
    info!(path = %storage.path().display(), strategy = "memory", "appending text");

    let scratch = MemoryScratch::for_append(container_len, text.len());
    append_with(scratch, storage, text, password, encoding, settings)
}

/// Temporary-file strategy. The directory check runs before any I/O.
pub(crate) fn append_via_temp_file(
    storage: &Storage,
    text: &str,
    password: &str,
    encoding: TextEncoding,
    temp_dir: &Path,
    settings: &Settings,
) -> Result<()> {
    let temp_dir = TempDirectory::for_target(temp_dir, storage.path())?;
    precheck(password, settings)?;
    info!(
        path = %storage.path().display(),
        temp_dir = %temp_dir.path().display(),
        strategy = "temp-file",
        "appending text"
    );

    let scratch = TempFileScratch::create_in(&temp_dir)?;
    append_with(scratch, storage, text, password, encoding, settings)
}

fn precheck(password: &str, settings: &Settings) -> Result<()> {
    if password.is_empty() {
        return Err(SealError::InvalidPassword);
    }
    settings.validate()
}
