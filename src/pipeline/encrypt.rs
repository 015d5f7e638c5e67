use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::write::DeflateEncoder;
use tracing::{debug, warn};

use crate::crypto::{CbcWriter, Header, derive_key};
use crate::error::{Result, SealError};
use crate::settings::Settings;

type Chain<W> = DeflateEncoder<CbcWriter<W>>;

/// Plaintext in, container out: compress, then encrypt.
///
/// Compress-then-encrypt is the container's byte layout and leaks the
/// compression ratio through the ciphertext length. That is accepted.
///
/// The header is written by [`Encryptor::new`]. Call [`Encryptor::close`] to
/// finalize; dropping an open encryptor finalizes best-effort and only logs
/// failures.
pub struct Encryptor<W: Write> {
    stream: Option<Chain<W>>,
    processed: u64,
}

impl<W: Write> Encryptor<W> {
    pub fn new(mut output: W, password: &str, settings: &Settings) -> Result<Self> {
        if password.is_empty() {
            return Err(SealError::InvalidPassword);
        }
        settings.validate()?;

        let header = Header::generate(settings)?;
        let key = derive_key(password, header.salt(), settings)?;
        header.write_to(&mut output)?;

        let cipher = CbcWriter::new(output, &key, header.iv())?;
        debug!(key_bits = settings.key_size_bits(), "encryptor ready");

        Ok(Self {
            stream: Some(DeflateEncoder::new(cipher, Compression::default())),
            processed: 0,
        })
    }

    /// Streams all of `source` through the pipeline.
    pub fn encrypt<R: Read>(&mut self, mut source: R) -> Result<u64> {
        Ok(io::copy(&mut source, self)?)
    }

    /// Plaintext bytes accepted so far.
    pub fn bytes_processed(&self) -> u64 {
        self.processed
    }

    /// Finishes compression, pads the last cipher block, flushes the output
    /// and returns it.
    pub fn close(mut self) -> Result<W> {
        let stream = self.stream.take().ok_or_else(closed)?;
        let output = finalize(stream)?;
        debug!(bytes = self.processed, "encryptor closed");
        Ok(output)
    }
}

fn finalize<W: Write>(stream: Chain<W>) -> io::Result<W> {
    let cipher = stream.finish()?;
    cipher.finish()
}

fn closed() -> io::Error {
    io::Error::other("encryptor already closed")
}

impl<W: Write> Write for Encryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.as_mut().ok_or_else(closed)?.write(buf)?;
        self.processed += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.as_mut().ok_or_else(closed)?.flush()
    }
}

impl<W: Write> Drop for Encryptor<W> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = finalize(stream) {
                warn!("failed to finalize dropped encryptor: {e}");
            }
        }
    }
}
