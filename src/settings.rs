//! Cipher and key-derivation parameters.
//!
//! Producer and consumer of a container must agree on these values; nothing
//! about them is stored in the container itself.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SealError};

/// AES block size. The only supported value.
pub const BLOCK_SIZE_BITS: u32 = 128;
/// Key sizes accepted by AES.
pub const KEY_SIZES_BITS: [u32; 3] = [128, 192, 256];
pub const DEFAULT_KEY_SIZE_BITS: u32 = 256;
pub const DEFAULT_SALT_SIZE_BITS: u32 = 128;
pub const DEFAULT_ITERATIONS: u32 = 1000;
pub const MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    #[default]
    Cbc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    #[default]
    Pkcs7,
}

/// Container settings. Every setter validates before assigning, so an
/// invalid value is never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSettings")]
pub struct Settings {
    block_size_bits: u32,
    key_size_bits: u32,
    mode: CipherMode,
    padding: PaddingMode,
    salt_size_bits: u32,
    iterations: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size_bits: BLOCK_SIZE_BITS,
            key_size_bits: DEFAULT_KEY_SIZE_BITS,
            mode: CipherMode::Cbc,
            padding: PaddingMode::Pkcs7,
            salt_size_bits: DEFAULT_SALT_SIZE_BITS,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl Settings {
    pub fn new(key_size_bits: u32, salt_size_bits: u32, iterations: u32) -> Result<Self> {
        let settings = Self {
            key_size_bits,
            salt_size_bits,
            iterations,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| {
            SealError::config(format!("failed to parse settings {}: {e}", path.display()))
        })
    }

    pub fn block_size_bits(&self) -> u32 {
        self.block_size_bits
    }

    pub fn key_size_bits(&self) -> u32 {
        self.key_size_bits
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn padding(&self) -> PaddingMode {
        self.padding
    }

    pub fn salt_size_bits(&self) -> u32 {
        self.salt_size_bits
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn block_len(&self) -> usize {
        (self.block_size_bits / 8) as usize
    }

    pub fn key_len(&self) -> usize {
        (self.key_size_bits / 8) as usize
    }

    pub fn salt_len(&self) -> usize {
        (self.salt_size_bits / 8) as usize
    }

    /// Salt plus IV: the fixed prefix of every container.
    pub fn header_len(&self) -> usize {
        self.salt_len() + self.block_len()
    }

    pub fn set_block_size_bits(&mut self, bits: u32) -> Result<()> {
        check_block_size(bits)?;
        self.block_size_bits = bits;
        Ok(())
    }

    pub fn set_key_size_bits(&mut self, bits: u32) -> Result<()> {
        check_key_size(bits)?;
        self.key_size_bits = bits;
        Ok(())
    }

    pub fn set_salt_size_bits(&mut self, bits: u32) -> Result<()> {
        check_salt_size(bits)?;
        self.salt_size_bits = bits;
        Ok(())
    }

    pub fn set_iterations(&mut self, iterations: u32) -> Result<()> {
        check_iterations(iterations)?;
        self.iterations = iterations;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_block_size(self.block_size_bits)?;
        check_key_size(self.key_size_bits)?;
        check_salt_size(self.salt_size_bits)?;
        check_iterations(self.iterations)
    }
}

fn check_block_size(bits: u32) -> Result<()> {
    if bits != BLOCK_SIZE_BITS {
        return Err(SealError::config(format!(
            "block size must be {BLOCK_SIZE_BITS} bits, got {bits}"
        )));
    }
    Ok(())
}

fn check_key_size(bits: u32) -> Result<()> {
    if !KEY_SIZES_BITS.contains(&bits) {
        return Err(SealError::config(format!(
            "key size must be one of 128, 192 or 256 bits, got {bits}"
        )));
    }
    Ok(())
}

fn check_salt_size(bits: u32) -> Result<()> {
    if bits == 0 || bits % 8 != 0 {
        return Err(SealError::config(format!(
            "salt size must be a positive multiple of 8 bits, got {bits}"
        )));
    }
    Ok(())
}

fn check_iterations(iterations: u32) -> Result<()> {
    if !(1..=MAX_ITERATIONS).contains(&iterations) {
        return Err(SealError::config(format!(
            "iteration count must be within 1..={MAX_ITERATIONS}, got {iterations}"
        )));
    }
    Ok(())
}

/// Unvalidated mirror of [`Settings`] used only for deserialization.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSettings {
    block_size_bits: u32,
    key_size_bits: u32,
    mode: CipherMode,
    padding: PaddingMode,
    salt_size_bits: u32,
    iterations: u32,
}

impl Default for RawSettings {
    fn default() -> Self {
        let d = Settings::default();
        Self {
            block_size_bits: d.block_size_bits,
            key_size_bits: d.key_size_bits,
            mode: d.mode,
            padding: d.padding,
            salt_size_bits: d.salt_size_bits,
            iterations: d.iterations,
        }
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = SealError;

    fn try_from(raw: RawSettings) -> Result<Self> {
        let settings = Settings {
            block_size_bits: raw.block_size_bits,
            key_size_bits: raw.key_size_bits,
            mode: raw.mode,
            padding: raw.padding,
            salt_size_bits: raw.salt_size_bits,
            iterations: raw.iterations,
        };
        settings.validate()?;
        Ok(settings)
    }
}
