//! Encrypting and decrypting pipelines bound to a byte sink or source.

pub mod decrypt;
pub mod encrypt;

pub use decrypt::{CHUNK_SIZE, Decryptor};
pub use encrypt::Encryptor;
