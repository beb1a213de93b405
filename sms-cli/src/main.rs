//! # sms-cli
//!
//! CLI tool for driving an SMS Mirror relay.
//!
//! ## Commands
//!
//! - `encrypt` / `decrypt`: Envelope encryption, computed locally
//! - `health`: Relay status
//! - `register`: Register a device identity
//! - `send`: Ask a connected device to send an SMS
//! - `messages`: Show relayed message history
//! - `devices`: List known devices
//!
//! ## Example
//!
//! ```bash
//! # Register a phone and get its channel URL
//! sms-cli register --device-id pixel-7 --name "Work phone" --platform android
//!
//! # Ask it to send a message
//! sms-cli send --to +15550100 --message "Running late" --device-id pixel-7
//!
//! # Encrypt a body before sending
//! sms-cli encrypt --text "Running late" --password hunter2
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod client;
mod commands;

use client::RelayClient;
use commands::{decrypt, devices, encrypt, health, messages, register, send};

/// CLI tool for driving an SMS Mirror relay.
#[derive(Parser, Debug)]
#[command(name = "sms-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Control API base URL
    #[arg(long, global = true, default_value = "http://localhost:3001")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt text with a passphrase (local, no relay needed)
    Encrypt {
        /// Plaintext
        #[arg(long, short)]
        text: String,

        /// Passphrase
        #[arg(long, short)]
        password: String,
    },

    /// Decrypt an envelope with a passphrase (local, no relay needed)
    Decrypt {
        /// Envelope JSON, as printed by `encrypt`
        #[arg(long, short)]
        envelope: String,

        /// Passphrase
        #[arg(long, short)]
        password: String,
    },

    /// Show relay health
    Health,

    /// Register a device identity
    Register {
        /// Device id the device will connect with
        #[arg(long)]
        device_id: String,

        /// Human-readable device name
        #[arg(long, short)]
        name: String,

        /// Platform ("ios", "android", ...)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Ask a connected device to send an SMS
    Send {
        /// Destination phone number
        #[arg(long)]
        to: String,

        /// Message body
        #[arg(long, short)]
        message: String,

        /// Target device (any connected device if omitted)
        #[arg(long)]
        device_id: Option<String>,

        /// Mark the body as an encrypted envelope
        #[arg(long)]
        encrypted: bool,
    },

    /// Show relayed message history, newest first
    Messages {
        /// Only messages from this device
        #[arg(long)]
        device_id: Option<String>,

        /// Maximum number of messages
        #[arg(long)]
        limit: Option<u32>,
    },

    /// List known devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RelayClient::new(&cli.server);

    match cli.command {
        Commands::Encrypt { text, password } => {
            encrypt::run(&text, &password)?;
        }
        Commands::Decrypt { envelope, password } => {
            decrypt::run(&envelope, &password)?;
        }
        Commands::Health => {
            health::run(&client).await?;
        }
        Commands::Register {
            device_id,
            name,
            platform,
        } => {
            register::run(&client, &device_id, &name, platform.as_deref()).await?;
        }
        Commands::Send {
            to,
            message,
            device_id,
            encrypted,
        } => {
            send::run(&client, &to, &message, device_id.as_deref(), encrypted).await?;
        }
        Commands::Messages { device_id, limit } => {
            messages::run(&client, device_id.as_deref(), limit).await?;
        }
        Commands::Devices => {
            devices::run(&client).await?;
        }
    }

    Ok(())
}
