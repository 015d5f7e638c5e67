use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::error::{Result, SealError};
use crate::settings::Settings;

/// Derives `key_size_bits / 8` bytes from `password` and `salt` with
/// PBKDF2-HMAC-SHA1.
pub fn derive_key(password: &str, salt: &[u8], settings: &Settings) -> Result<Zeroizing<Vec<u8>>> {
    if password.is_empty() {
        return Err(SealError::InvalidPassword);
    }
    settings.validate()?;

    let mut key = Zeroizing::new(vec![0u8; settings.key_len()]);
    pbkdf2::<Hmac<Sha1>>(password.as_bytes(), salt, settings.iterations(), &mut key)
        .map_err(|e| SealError::config(format!("PBKDF2 failed: {e}")))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; 16];
        let settings = Settings::default();

        let k1 = derive_key("password", &salt, &settings).unwrap();
        let k2 = derive_key("password", &salt, &settings).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn salt_affects_output() {
        let settings = Settings::default();

        let k1 = derive_key("pw", &[1u8; 16], &settings).unwrap();
        let k2 = derive_key("pw", &[2u8; 16], &settings).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn key_length_follows_key_size() {
        let mut settings = Settings::default();
        settings.set_key_size_bits(256).unwrap();
        assert_eq!(derive_key("pw", &[0u8; 16], &settings).unwrap().len(), 32);

        settings.set_key_size_bits(128).unwrap();
        assert_eq!(derive_key("pw", &[0u8; 16], &settings).unwrap().len(), 16);
    }

    #[test]
    fn rfc6070_vector() {
        // PBKDF2-HMAC-SHA1, "password" / "salt", 2 iterations, first 16 bytes
        let settings = Settings::new(128, 32, 2).unwrap();
        let key = derive_key("password", b"salt", &settings).unwrap();
        assert_eq!(
            *key,
            [
                0xea, 0x6c, 0x01, 0x4d, 0xc7, 0x2d, 0x6f, 0x8c, 0xcd, 0x1e, 0xd9, 0x2a, 0xce, 0x1d,
                0x41, 0xf0
            ]
        );
    }

    #[test]
    fn empty_password_fails() {
        assert!(matches!(
            derive_key("", &[0u8; 16], &Settings::default()),
            Err(SealError::InvalidPassword)
        ));
    }
}
