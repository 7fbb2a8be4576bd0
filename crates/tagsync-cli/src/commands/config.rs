//! Config command - View and scaffold configuration
//!
//! - Show the effective configuration after all layers are merged
//! - Create a default config file (local or global)
//! - Show configuration file paths
//! - Manage the secret key and encrypt values for `encrypted_*` keys

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tagsync_config::{ConfigLoader, SecretKey};

use super::{load_config, print_info};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Create a configuration file with default values
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),

    /// Create the secret key used for encrypted values
    GenerateKey(GenerateKeyArgs),

    /// Encrypt a value for catalog.encrypted_password or warehouse.encrypted_token
    Encrypt(EncryptArgs),

    /// Decrypt a value produced by `config encrypt`
    Decrypt(DecryptArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create the global config (~/.tagsync/config.toml) instead of a local one
    #[arg(long)]
    global: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the generate-key command
#[derive(clap::Args, Debug)]
pub struct GenerateKeyArgs {
    /// Replace an existing key; values encrypted with it become unreadable
    #[arg(long)]
    force: bool,
}

/// Arguments for the encrypt command
#[derive(clap::Args, Debug)]
pub struct EncryptArgs {
    /// Value to encrypt (read from stdin when omitted)
    value: Option<String>,
}

/// Arguments for the decrypt command
#[derive(clap::Args, Debug)]
pub struct DecryptArgs {
    /// Encrypted value
    value: String,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Config file given with --config
    pub explicit: Option<PathBuf>,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::GenerateKey(args) => execute_generate_key(args, global),
        ConfigCommand::Encrypt(args) => execute_encrypt(args, global),
        ConfigCommand::Decrypt(args) => execute_decrypt(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    // Secrets are either environment variable names or encrypted tokens.
    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to render configuration")?
        );
    }
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader
            .init_global()
            .context("Failed to create global configuration")?
    } else {
        let work_dir = std::env::current_dir().context("Failed to get current directory")?;
        loader
            .init_local(&work_dir)
            .context("Failed to create local configuration")?
    };

    print_info(&format!("Configuration file: {}", path.display()), global.quiet);
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let work_dir = std::env::current_dir().context("Failed to get current directory")?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&work_dir);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
        explicit: global.config.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        println!("Configuration Paths");
        println!("{}", "=".repeat(50));
        match &paths.global {
            Some(path) => println!("  Global: {} ({})", path.display(), exists(paths.global_exists)),
            None => println!("  Global: (no home directory)"),
        }
        println!("  Local:  {} ({})", paths.local.display(), exists(paths.local_exists));
        if let Some(path) = &paths.explicit {
            println!(
                "  --config: {} ({})",
                path.display(),
                exists(path.exists())
            );
        }
    }

    Ok(())
}

fn load_key(global: &GlobalOptions) -> Result<SecretKey> {
    let config = load_config(global)?;
    let path = config.secrets.key_path()?;
    SecretKey::load(&path).with_context(|| {
        format!(
            "Failed to load secret key from {} (run `tagsync config generate-key`)",
            path.display()
        )
    })
}

fn execute_generate_key(args: GenerateKeyArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let path = config.secrets.key_path()?;
    SecretKey::create(&path, args.force).context("Failed to create secret key")?;

    print_info(&format!("Secret key: {}", path.display()), global.quiet);
    Ok(())
}

fn execute_encrypt(args: EncryptArgs, global: GlobalOptions) -> Result<()> {
    let key = load_key(&global)?;
    let value = match args.value {
        Some(value) => value,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read value from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if value.is_empty() {
        anyhow::bail!("Nothing to encrypt");
    }

    println!("{}", key.encrypt(&value));
    Ok(())
}

fn execute_decrypt(args: DecryptArgs, global: GlobalOptions) -> Result<()> {
    let key = load_key(&global)?;
    println!("{}", key.decrypt(&args.value)?);
    Ok(())
}

fn exists(flag: bool) -> &'static str {
    if flag {
        "exists"
    } else {
        "not found"
    }
}
