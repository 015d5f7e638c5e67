//! Streaming AES-CBC with PKCS#7 padding.
//!
//! [`CbcWriter`] encrypts every complete block as soon as it is available and
//! pads on [`CbcWriter::finish`]. [`CbcReader`] always withholds the last
//! complete ciphertext block until end of input, because only that block
//! carries padding.

use std::io::{self, Read, Write};

use aes::{Aes128, Aes192, Aes256, Block};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InvalidLength, KeyIvInit};

use crate::error::{Result, SealError};

pub const BLOCK_LEN: usize = 16;
const READ_CHUNK: usize = 4096;

fn bad_key(_: InvalidLength) -> SealError {
    SealError::config("key or IV length does not match the cipher")
}

fn invalid_data(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

enum BlockEncryptor {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

impl BlockEncryptor {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(match key.len() {
            16 => Self::Aes128(cbc::Encryptor::new_from_slices(key, iv).map_err(bad_key)?),
            24 => Self::Aes192(cbc::Encryptor::new_from_slices(key, iv).map_err(bad_key)?),
            32 => Self::Aes256(cbc::Encryptor::new_from_slices(key, iv).map_err(bad_key)?),
            n => return Err(SealError::config(format!("unsupported AES key length {n}"))),
        })
    }

    fn encrypt_block(&mut self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.encrypt_block_mut(block),
            Self::Aes192(c) => c.encrypt_block_mut(block),
            Self::Aes256(c) => c.encrypt_block_mut(block),
        }
    }
}

enum BlockDecryptor {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

impl BlockDecryptor {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(match key.len() {
            16 => Self::Aes128(cbc::Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            24 => Self::Aes192(cbc::Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            32 => Self::Aes256(cbc::Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            n => return Err(SealError::config(format!("unsupported AES key length {n}"))),
        })
    }

    fn decrypt_block(&mut self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.decrypt_block_mut(block),
            Self::Aes192(c) => c.decrypt_block_mut(block),
            Self::Aes256(c) => c.decrypt_block_mut(block),
        }
    }
}

/// Encrypting half of the cipher transform.
pub struct CbcWriter<W: Write> {
    inner: W,
    cipher: BlockEncryptor,
    pending: [u8; BLOCK_LEN],
    pending_len: usize,
    out: Vec<u8>,
}

impl<W: Write> CbcWriter<W> {
    pub fn new(inner: W, key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            cipher: BlockEncryptor::new(key, iv)?,
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
            out: Vec::with_capacity(READ_CHUNK),
        })
    }

    fn push_block(&mut self) {
        let mut block = Block::from(self.pending);
        self.cipher.encrypt_block(&mut block);
        self.out.extend_from_slice(&block);
        self.pending_len = 0;
    }

    /// Pads and encrypts the final block, flushes, and hands back the sink.
    ///
    /// A full padding block is emitted when the input was block-aligned.
    pub fn finish(mut self) -> io::Result<W> {
        let pad = BLOCK_LEN - self.pending_len;
        self.pending[self.pending_len..].fill(pad as u8);
        self.out.clear();
        self.push_block();
        self.inner.write_all(&self.out)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CbcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.clear();
        let mut rest = buf;
        while !rest.is_empty() {
            let take = (BLOCK_LEN - self.pending_len).min(rest.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&rest[..take]);
            self.pending_len += take;
            rest = &rest[take..];
            if self.pending_len == BLOCK_LEN {
                self.push_block();
            }
        }
        self.inner.write_all(&self.out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting half of the cipher transform.
pub struct CbcReader<R: Read> {
    inner: R,
    cipher: BlockDecryptor,
    raw: Vec<u8>,
    plain: Vec<u8>,
    pos: usize,
    ciphertext_seen: u64,
    done: bool,
}

impl<R: Read> CbcReader<R> {
    pub fn new(inner: R, key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            cipher: BlockDecryptor::new(key, iv)?,
            raw: Vec::with_capacity(READ_CHUNK + BLOCK_LEN),
            plain: Vec::with_capacity(READ_CHUNK + BLOCK_LEN),
            pos: 0,
            ciphertext_seen: 0,
            done: false,
        })
    }

    /// Errors unless the whole ciphertext was consumed and its padding
    /// checked. Used at teardown only.
    pub fn check_complete(&self) -> io::Result<()> {
        if !self.done {
            return Err(invalid_data("ciphertext was not read to the final block"));
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn decrypt_into_plain(&mut self, len: usize) {
        for chunk in self.raw[..len].chunks_exact(BLOCK_LEN) {
            let mut block = Block::clone_from_slice(chunk);
            self.cipher.decrypt_block(&mut block);
            self.plain.extend_from_slice(&block);
        }
        self.raw.drain(..len);
    }

    fn fill(&mut self) -> io::Result<()> {
        self.plain.clear();
        self.pos = 0;

        let mut buf = [0u8; READ_CHUNK];
        while self.plain.is_empty() && !self.done {
            let n = match self.inner.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.raw.extend_from_slice(&buf[..n]);
            self.ciphertext_seen += n as u64;

            if n > 0 {
                // keep the newest complete block back: it may be the padded one
                let ready = (self.raw.len() - 1) / BLOCK_LEN * BLOCK_LEN;
                self.decrypt_into_plain(ready);
                continue;
            }

            if self.ciphertext_seen == 0 {
                return Err(invalid_data("container holds no ciphertext"));
            }
            if self.raw.len() % BLOCK_LEN != 0 {
                return Err(invalid_data(
                    "ciphertext length is not a multiple of the block size",
                ));
            }
            let len = self.raw.len();
            self.decrypt_into_plain(len);
            strip_padding(&mut self.plain)?;
            self.done = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for CbcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.plain.len() {
            self.fill()?;
        }
        let n = (self.plain.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn strip_padding(plain: &mut Vec<u8>) -> io::Result<()> {
    let pad = match plain.last() {
        Some(&b) => b as usize,
        None => return Err(invalid_data("missing padding block")),
    };
    if pad == 0 || pad > BLOCK_LEN || pad > plain.len() {
        return Err(invalid_data("invalid padding"));
    }
    let start = plain.len() - pad;
    if plain[start..].iter().any(|&b| b as usize != pad) {
        return Err(invalid_data("invalid padding"));
    }
    plain.truncate(start);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];
    const IV: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];

    fn encrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut w = CbcWriter::new(Vec::new(), key, &IV).unwrap();
        w.write_all(data).unwrap();
        w.finish().unwrap()
    }

    fn decrypt(key: &[u8], data: &[u8]) -> io::Result<Vec<u8>> {
        let mut r = CbcReader::new(data, key, &IV).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out)?;
        r.check_complete()?;
        Ok(out)
    }

    #[test]
    fn nist_cbc_aes128_first_block() {
        // SP 800-38A F.2.1
        let pt = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];
        let ct = encrypt(&KEY, &pt);
        assert_eq!(ct.len(), 32);
        assert_eq!(
            ct[..16],
            [
                0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9,
                0x19, 0x7d
            ]
        );
    }

    #[test]
    fn padding_always_added() {
        assert_eq!(encrypt(&KEY, b"").len(), 16);
        assert_eq!(encrypt(&KEY, &[1u8; 15]).len(), 16);
        assert_eq!(encrypt(&KEY, &[1u8; 16]).len(), 32);
        assert_eq!(encrypt(&KEY, &[1u8; 17]).len(), 32);
    }

    #[test]
    fn roundtrip_all_key_sizes_and_odd_writes() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        for key_len in [16, 24, 32] {
            let key = vec![7u8; key_len];
            let mut w = CbcWriter::new(Vec::new(), &key, &IV).unwrap();
            for piece in data.chunks(37) {
                w.write_all(piece).unwrap();
            }
            let ct = w.finish().unwrap();
            assert_eq!(decrypt(&key, &ct).unwrap(), data);
        }
    }

    #[test]
    fn misaligned_ciphertext_is_invalid_data() {
        let mut ct = encrypt(&KEY, b"hello");
        ct.pop();
        let err = decrypt(&KEY, &ct).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn empty_ciphertext_is_invalid_data() {
        let err = decrypt(&KEY, &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn bad_padding_is_invalid_data() {
        // dropping the padding block leaves a final block ending in 0x00
        let mut w = CbcWriter::new(Vec::new(), &KEY, &IV).unwrap();
        w.write_all(&[0u8; 16]).unwrap();
        let mut ct = w.finish().unwrap();
        ct.truncate(16);
        let err = decrypt(&KEY, &ct).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unread_reader_is_incomplete() {
        let ct = encrypt(&KEY, b"hello");
        let r = CbcReader::new(&ct[..], &KEY, &IV).unwrap();
        assert!(r.check_complete().is_err());
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(CbcWriter::new(Vec::new(), &[0u8; 20], &IV).is_err());
        assert!(CbcReader::new(&[0u8; 0][..], &[0u8; 20], &IV).is_err());
    }
}
