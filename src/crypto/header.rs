use std::io::{self, Read, Write};

use getrandom::fill;
use tracing::debug;

use crate::error::{Result, SealError};
use crate::settings::Settings;

/// Unencrypted container prefix.
///
/// ```text
/// SALT (salt_size_bits / 8) | IV (block_size_bits / 8) | CIPHERTEXT
/// ```
///
/// There is no magic number or version field; the layout is implied by the
/// [`Settings`] both sides agree on.
#[derive(Debug)]
pub struct Header {
    salt: Vec<u8>,
    iv: Vec<u8>,
}

impl Header {
    /// Fresh random salt and IV sized by `settings`.
    pub fn generate(settings: &Settings) -> Result<Self> {
        let mut salt = vec![0u8; settings.salt_len()];
        let mut iv = vec![0u8; settings.block_len()];
        secure_random(&mut salt)?;
        secure_random(&mut iv)?;
        Ok(Self { salt, iv })
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn encoded_len(&self) -> usize {
        self.salt.len() + self.iv.len()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(&self.salt)?;
        out.write_all(&self.iv)?;
        debug!(salt = self.salt.len(), iv = self.iv.len(), "header written");
        Ok(())
    }

    /// Reads exactly the salt, then exactly the IV.
    pub fn read_from<R: Read>(input: &mut R, settings: &Settings) -> Result<Self> {
        let expected = settings.header_len();

        let mut salt = vec![0u8; settings.salt_len()];
        let got = read_full(input, &mut salt)?;
        if got < salt.len() {
            return Err(SealError::TruncatedHeader {
                expected,
                actual: got,
            });
        }

        let mut iv = vec![0u8; settings.block_len()];
        let got_iv = read_full(input, &mut iv)?;
        if got_iv < iv.len() {
            return Err(SealError::TruncatedHeader {
                expected,
                actual: got + got_iv,
            });
        }

        debug!(salt = salt.len(), iv = iv.len(), "header read");
        Ok(Self { salt, iv })
    }
}

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|e| io::Error::other(format!("OS random generator unavailable: {e}")))?;
    Ok(())
}

/// Like `read_exact`, but reports how much was read before end of stream.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
