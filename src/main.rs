use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
mod auth;
use directories::ProjectDirs;
use sealpad::{Settings, TextEncoding};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
struct SettingsArgs {
    /// JSON file with container settings
    #[arg(long, global = true, value_name = "PATH", env = "SEALPAD_SETTINGS")]
    settings: Option<PathBuf>,

    /// AES key size in bits: 128, 192 or 256 (default: 256)
    #[arg(long = "key-size", global = true)]
    key_size_bits: Option<u32>,

    /// Salt size in bits, a multiple of 8 (default: 128)
    #[arg(long = "salt-size", global = true)]
    salt_size_bits: Option<u32>,

    /// PBKDF2 iteration count (default: 1000)
    #[arg(long, global = true)]
    iterations: Option<u32>,
}

impl SettingsArgs {
    fn to_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };

        if let Some(bits) = self.key_size_bits {
            settings.set_key_size_bits(bits)?;
        }
        if let Some(bits) = self.salt_size_bits {
            settings.set_salt_size_bits(bits)?;
        }
        if let Some(n) = self.iterations {
            settings.set_iterations(n)?;
        }
        Ok(settings)
    }
}

#[derive(Debug, Parser)]
#[command(name = "sealpad")]
#[command(
    version,
    about = "Password-sealed files: compress, encrypt, and append text safely."
)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file into a sealed container
    #[command(arg_required_else_help = true)]
    Encrypt { source: PathBuf, destination: PathBuf },

    /// Decrypts a sealed container into a plain file
    #[command(arg_required_else_help = true)]
    Decrypt { source: PathBuf, destination: PathBuf },

    /// Appends a line of text to a sealed container, creating it if needed
    #[command(arg_required_else_help = true)]
    Append {
        file: PathBuf,
        text: String,

        /// Text encoding: utf-8, utf-8-bom, utf-16le, utf-16be
        #[arg(long, default_value_t = TextEncoding::Utf8)]
        encoding: TextEncoding,

        /// Stage plaintext in a temporary file instead of memory; without a
        /// value the user cache directory is used
        #[arg(long, value_name = "DIR")]
        temp_dir: Option<Option<PathBuf>>,
    },
}

fn default_temp_dir() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "sealpad").context("could not determine platform directories")?;
    let dir = project_dirs.cache_dir().to_path_buf();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Cli::parse();
    let settings = args.settings.to_settings()?;

    match args.command {
        Commands::Encrypt {
            source,
            destination,
        } => {
            let password = auth::read_new_password_with_confirmation()?;
            sealpad::encrypt_file(&source, &destination, &password, &settings)?;
            println!("encrypted '{}'", destination.display());
        }
        Commands::Decrypt {
            source,
            destination,
        } => {
            let password = auth::read_password()?;
            sealpad::decrypt_file(&source, &destination, &password, &settings)?;
            println!("decrypted '{}'", destination.display());
        }
        Commands::Append {
            file,
            text,
            encoding,
            temp_dir,
        } => {
            let password = auth::read_password()?;
            match temp_dir {
                None => sealpad::append_text(&file, &text, &password, encoding, &settings)?,
                Some(dir) => {
                    let dir = match dir {
                        Some(dir) => dir,
                        None => default_temp_dir()?,
                    };
                    sealpad::append_text_via_temp(
                        &file, &text, &password, encoding, &dir, &settings,
                    )?
                }
            }
            println!("appended to '{}'", file.display());
        }
    }

    Ok(())
}
