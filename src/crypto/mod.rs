//! Cryptographic building blocks for the container format.
//!
//! Provides key derivation, the salt/IV header, and the streaming CBC
//! transform.

pub mod cbc;
pub mod header;
pub mod kdf;

pub use cbc::{BLOCK_LEN, CbcReader, CbcWriter};
pub use header::Header;
pub use kdf::derive_key;
