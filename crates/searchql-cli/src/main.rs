//! searchql command-line entry point
//!
//! Reads a compile request from the file named by the first argument, or from
//! stdin, and prints the compiled fragments as JSON.

mod request;

use anyhow::{Context, Result};
use request::Request;
use std::io::Read;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn read_input() -> Result<String> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Reading request from {}", path);
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))
        }
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read request from stdin")?;
            Ok(input)
        }
    }
}

fn run() -> Result<()> {
    let request = Request::from_json(&read_input()?)?;
    let response = request.compile()?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn main() {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
