//! Create a record, publish it to an in-memory store, then inspect it back.
//!
//! ```text
//! ipns-inspector <value> [ttl] [validity] [sequence]
//! ```
//!
//! Set `IPNS_INSPECTOR_CONFIG` to a JSON `MachineConfig` to override defaults.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate tracing;

use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use ipns_inspector::errors::*;
use ipns_inspector::name;
use ipns_inspector::{
    spawn, Ed25519KeyManager, Event, FormField, Machine, MachineConfig, MemoryFetcher, Mode,
};

const USAGE: &str = "usage: ipns-inspector <value> [ttl] [validity] [sequence]";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", render_chain(&e));
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match env::var("IPNS_INSPECTOR_CONFIG") {
        Ok(path) => MachineConfig::load(Path::new(&path))?,
        Err(_) => MachineConfig::default(),
    };

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.len() > 4 {
        bail!(USAGE);
    }

    let fetcher = Arc::new(MemoryFetcher::new());
    let handle = spawn(Machine::new(fetcher.clone(), Ed25519KeyManager, config));

    handle.send(Event::UpdateMode { value: Mode::Create })?;
    let fields = [FormField::Value, FormField::Ttl, FormField::Validity, FormField::Sequence];
    for (field, value) in fields.iter().zip(args) {
        handle.send(Event::UpdateForm {
            field: *field,
            value: value,
        })?;
    }

    let created = handle.dispatch(Event::Create).await?;
    if let Some(err) = created.error {
        bail!("create failed at {} stage: {}", err.stage, err.message);
    }

    let (name, encoded) = match (created.name_inspecting, created.record) {
        (Some(name), Some(record)) => (name, record.encoded),
        _ => return Err("create produced no record".into()),
    };
    let encoded = encoded.ok_or_else(|| Error::from("create produced no record bytes"))?;

    let parsed = name::validate(&name).map_err(|e| Error::from(ErrorKind::InvalidName(e)))?;
    let bytes = BASE64
        .decode(&encoded)
        .chain_err(|| "Failed to decode record bytes")?;
    fetcher.publish(&parsed, bytes);
    info!(name = %name, "published");

    handle.send(Event::UpdateMode { value: Mode::Inspect })?;
    handle.send(Event::UpdateName { value: name })?;
    let started = handle.dispatch(Event::InspectName).await?;
    if !started.fetching_record {
        bail!("inspect was not started");
    }

    let inspected = handle.wait_until(|s| !s.fetching_record).await?;
    if let Some(ref err) = inspected.error {
        bail!("inspect failed at {} stage: {}", err.stage, err.message);
    }

    let json = serde_json::to_string_pretty(&inspected).chain_err(|| "Failed to render snapshot")?;
    println!("{}", json);

    Ok(())
}
