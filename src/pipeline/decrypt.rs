use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{CbcReader, Header, derive_key};
use crate::error::{Result, SealError};
use crate::settings::Settings;

/// Read size of the decrypt loop.
pub const CHUNK_SIZE: usize = 4096;

type Chain<R> = DeflateDecoder<CbcReader<R>>;

/// Container in, plaintext out: decrypt, then decompress.
///
/// [`Decryptor::new`] consumes the header. Without an integrity tag a wrong
/// password usually fails on padding or inflate, but can also yield garbage.
pub struct Decryptor<R: Read> {
    stream: Option<Chain<R>>,
    processed: u64,
}

impl<R: Read> Decryptor<R> {
    pub fn new(mut input: R, password: &str, settings: &Settings) -> Result<Self> {
        if password.is_empty() {
            return Err(SealError::InvalidPassword);
        }
        settings.validate()?;

        let header = Header::read_from(&mut input, settings)?;
        let key = derive_key(password, header.salt(), settings)?;
        let cipher = CbcReader::new(input, &key, header.iv())?;
        debug!(key_bits = settings.key_size_bits(), "decryptor ready");

        Ok(Self {
            stream: Some(DeflateDecoder::new(cipher)),
            processed: 0,
        })
    }

    /// Decrypts the rest of the container into memory.
    pub fn decrypt(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(Vec::new());
        self.decrypt_to(&mut *out)?;
        Ok(out)
    }

    /// Decrypts the rest of the container into `sink`, returning the number
    /// of plaintext bytes written.
    pub fn decrypt_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64> {
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        let mut buf = Zeroizing::new([0u8; CHUNK_SIZE]);
        let mut total = 0u64;

        loop {
            let n = match stream.read(&mut buf[..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SealError::from_read(e)),
            };
            sink.write_all(&buf[..n])?;
            total += n as u64;
            self.processed += n as u64;
        }

        // inflate stops at its end marker; pull the remaining ciphertext so
        // the final block's padding is checked
        io::copy(stream.get_mut(), &mut io::sink()).map_err(SealError::from_read)?;

        Ok(total)
    }

    /// Plaintext bytes handed out so far.
    pub fn bytes_processed(&self) -> u64 {
        self.processed
    }

    /// Releases the decompressor, then the cipher, and returns the source.
    ///
    /// An unfinished cipher stream is reported as `DecryptionFailed`, except
    /// on a decryptor that never produced a byte: there the diagnostic comes
    /// from teardown alone and is dropped.
    pub fn close(mut self) -> Result<R> {
        let stream = self.stream.take().ok_or_else(closed)?;
        let cipher = stream.into_inner();
        let diagnostic = cipher.check_complete();
        let input = cipher.into_inner();

        if let Err(e) = diagnostic {
            if self.processed > 0 {
                return Err(SealError::DecryptionFailed(e.to_string()));
            }
            debug!("suppressed teardown diagnostic on unused decryptor: {e}");
        }
        debug!(bytes = self.processed, "decryptor closed");
        Ok(input)
    }
}

fn closed() -> io::Error {
    io::Error::other("decryptor already closed")
}

impl<R: Read> Read for Decryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream.as_mut().ok_or_else(closed)?.read(buf)?;
        self.processed += n as u64;
        Ok(n)
    }
}
