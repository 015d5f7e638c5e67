//! Password-sealed files.
//!
//! A container is `salt | iv | ciphertext`, where the ciphertext is AES-CBC
//! (PKCS#7) over DEFLATE-compressed plaintext and the key comes from
//! PBKDF2-HMAC-SHA1 over the password and salt. There is no integrity tag.

mod append;
mod crypto;
mod encoding;
mod error;
mod pipeline;
mod settings;
mod storage;

pub use crate::append::TempDirectory;
pub use crate::crypto::derive_key;
pub use crate::encoding::{LINE_ENDING, TextEncoding};
pub use crate::error::{Result, SealError};
pub use crate::pipeline::{CHUNK_SIZE, Decryptor, Encryptor};
pub use crate::settings::{CipherMode, PaddingMode, Settings};
pub use crate::storage::Storage;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;
use zeroize::Zeroizing;

/// Seals `plaintext` into a new container.
pub fn encrypt_bytes(plaintext: &[u8], password: &str, settings: &Settings) -> Result<Vec<u8>> {
    let capacity = settings.header_len() + plaintext.len() + crypto::BLOCK_LEN;
    let mut encryptor = Encryptor::new(Vec::with_capacity(capacity), password, settings)?;
    encryptor.write_all(plaintext)?;
    encryptor.close()
}

/// Opens a container held in memory.
pub fn decrypt_bytes(
    container: &[u8],
    password: &str,
    settings: &Settings,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut decryptor = Decryptor::new(container, password, settings)?;
    let plaintext = decryptor.decrypt()?;
    decryptor.close()?;
    Ok(plaintext)
}

/// Encrypts the file at `source` into a container at `destination`.
///
/// `destination` is replaced atomically.
pub fn encrypt_file(
    source: &Path,
    destination: &Path,
    password: &str,
    settings: &Settings,
) -> Result<()> {
    info!(source = %source.display(), destination = %destination.display(), "encrypting file");
    let input = BufReader::new(File::open(source)?);

    Storage::new(destination.to_path_buf()).save_with(|file| {
        let mut encryptor = Encryptor::new(BufWriter::new(file), password, settings)?;
        encryptor.encrypt(input)?;
        encryptor.close()?.flush()?;
        Ok(())
    })
}

/// Decrypts the container at `source` into a plaintext file at
/// `destination`.
///
/// `destination` is replaced atomically, and left alone if decryption fails.
pub fn decrypt_file(
    source: &Path,
    destination: &Path,
    password: &str,
    settings: &Settings,
) -> Result<()> {
    info!(source = %source.display(), destination = %destination.display(), "decrypting file");
    let mut decryptor = Decryptor::new(BufReader::new(File::open(source)?), password, settings)?;

    Storage::new(destination.to_path_buf()).save_with(|file| {
        let mut output = BufWriter::new(file);
        decryptor.decrypt_to(&mut output)?;
        output.flush()?;
        Ok(())
    })?;

    decryptor.close()?;
    Ok(())
}

/// Appends `text` and [`LINE_ENDING`] to the container at `file`, creating
/// it if missing. The whole plaintext is held in memory while rewriting.
pub fn append_text(
    file: &Path,
    text: &str,
    password: &str,
    encoding: TextEncoding,
    settings: &Settings,
) -> Result<()> {
    let storage = Storage::new(file.to_path_buf());
    append::append_in_memory(&storage, text, password, encoding, settings)
}

/// Like [`append_text`], but stages the plaintext in a temporary file inside
/// `temp_dir`, which must not be the directory containing `file`.
pub fn append_text_via_temp(
    file: &Path,
    text: &str,
    password: &str,
    encoding: TextEncoding,
    temp_dir: &Path,
    settings: &Settings,
) -> Result<()> {
    let storage = Storage::new(file.to_path_buf());
    append::append_via_temp_file(&storage, text, password, encoding, temp_dir, settings)
}
