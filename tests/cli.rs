use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn bin() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sealpad"));
    cmd.env_remove("SEALPAD_SETTINGS");
    cmd
}

#[test]
fn encrypt_and_decrypt_roundtrip() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain.txt");
    let sealed = dir.path().join("plain.enc");
    let restored = dir.path().join("restored.txt");
    fs::write(&plain, "top secret\n").unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("encrypt")
        .arg(&plain)
        .arg(&sealed)
        .assert()
        .success()
        .stdout(predicate::str::contains("encrypted"));

    assert!(sealed.exists());
    assert_ne!(fs::read(&sealed).unwrap(), b"top secret\n");

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("decrypt")
        .arg(&sealed)
        .arg(&restored)
        .assert()
        .success()
        .stdout(predicate::str::contains("decrypted"));

    assert_eq!(fs::read_to_string(&restored).unwrap(), "top secret\n");
}

#[test]
fn append_creates_and_extends_file() {
    let dir = tempdir().unwrap();
    let sealed = dir.path().join("log.enc");
    let restored = dir.path().join("log.txt");

    for text in ["first", "second"] {
        bin()
            .env("SEALPAD_PASSWORD", "pw")
            .arg("append")
            .arg(&sealed)
            .arg(text)
            .assert()
            .success()
            .stdout(predicate::str::contains("appended"));
    }

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("decrypt")
        .arg(&sealed)
        .arg(&restored)
        .assert()
        .success();

    let expected = format!("first{0}second{0}", sealpad::LINE_ENDING);
    assert_eq!(fs::read_to_string(&restored).unwrap(), expected);
}

#[test]
fn append_via_temp_dir() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let sealed = dir.path().join("log.enc");

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("append")
        .arg(&sealed)
        .arg("hello")
        .arg("--temp-dir")
        .arg(scratch.path())
        .assert()
        .success();

    assert!(sealed.exists());
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn append_temp_dir_equal_to_target_dir_fails() {
    let dir = tempdir().unwrap();
    let sealed = dir.path().join("log.enc");

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("append")
        .arg(&sealed)
        .arg("hello")
        .arg("--temp-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));

    assert!(!sealed.exists());
}

#[test]
fn wrong_password_fails() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain.txt");
    let sealed = dir.path().join("plain.enc");
    let restored = dir.path().join("restored.txt");
    // long enough that inflate is certain to reject garbage
    fs::write(&plain, "lorem ipsum dolor sit amet ".repeat(200)).unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("encrypt")
        .arg(&plain)
        .arg(&sealed)
        .assert()
        .success();

    let assert = bin()
        .env("SEALPAD_PASSWORD", "wrong_pw")
        .arg("decrypt")
        .arg(&sealed)
        .arg(&restored)
        .assert();

    // no integrity tag: failure is the overwhelmingly likely outcome, but a
    // garbage "success" must at least not reproduce the plaintext
    if restored.exists() {
        assert_ne!(fs::read(&restored).unwrap(), fs::read(&plain).unwrap());
    } else {
        assert
            .failure()
            .stderr(predicate::str::contains("Invalid password or corrupted data"));
    }
}

#[test]
fn truncated_container_fails() {
    let dir = tempdir().unwrap();
    let sealed = dir.path().join("short.enc");
    fs::write(&sealed, [0u8; 10]).unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("decrypt")
        .arg(&sealed)
        .arg(dir.path().join("out.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("truncated header"));
}

#[test]
fn invalid_key_size_fails() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain.txt");
    fs::write(&plain, "x").unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("--key-size")
        .arg("100")
        .arg("encrypt")
        .arg(&plain)
        .arg(dir.path().join("plain.enc"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("key size"));
}

#[test]
fn settings_file_must_match_for_decrypt() {
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain.txt");
    let sealed = dir.path().join("plain.enc");
    let restored = dir.path().join("restored.txt");
    let settings = dir.path().join("settings.json");
    fs::write(&plain, "configured").unwrap();
    fs::write(&settings, r#"{"key_size_bits": 128, "salt_size_bits": 64}"#).unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .env("SEALPAD_SETTINGS", &settings)
        .arg("encrypt")
        .arg(&plain)
        .arg(&sealed)
        .assert()
        .success();

    // header is 8 salt bytes + 16 IV bytes
    assert_eq!((fs::read(&sealed).unwrap().len() - 24) % 16, 0);

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("--settings")
        .arg(&settings)
        .arg("decrypt")
        .arg(&sealed)
        .arg(&restored)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&restored).unwrap(), "configured");
}

#[test]
fn unknown_encoding_is_rejected() {
    let dir = tempdir().unwrap();

    bin()
        .env("SEALPAD_PASSWORD", "pw")
        .arg("append")
        .arg(dir.path().join("log.enc"))
        .arg("x")
        .arg("--encoding")
        .arg("ebcdic")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown text encoding"));
}
