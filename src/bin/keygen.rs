//! tallydeck-keygen - Provision P-256 device key pairs
//!
//! Generates a key pair for a device, prints both PEMs, and can register
//! the public half straight into a key store file. The private key goes
//! to the device at manufacturing time and never touches the server again.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tallydeck_auth::generate_keypair;
use tallydeck_store::{DeviceKey, DeviceKeyStore};
use uuid::Uuid;

/// Generate and optionally provision a device key pair
#[derive(Parser, Debug)]
#[command(name = "tallydeck-keygen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Device UUID (generated when omitted)
    #[arg(long)]
    uuid: Option<Uuid>,

    /// Register the public key in this key store file
    #[arg(long)]
    register: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let device_uuid = args.uuid.unwrap_or_else(Uuid::new_v4);
    let (private_pem, public_pem) = generate_keypair()?;

    println!("Device UUID: {}", device_uuid);
    println!();
    println!("{}", public_pem);
    println!("{}", private_pem);

    if let Some(path) = args.register {
        let store = DeviceKeyStore::with_path(path.clone()).await?;
        store
            .insert(DeviceKey::new(device_uuid, public_pem))
            .await?;
        println!("Registered public key in {:?}", path);
    }

    Ok(())
}
