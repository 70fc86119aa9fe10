//! Keyring-backed credential management commands

use std::error::Error;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::core::credentials::{KeyringCredentials, API_KEY_ENV};

pub fn run_auth() -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        print!("Enter your OpenAI API key: ");
        io::stdout().flush()?;
    }

    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let token = parse_token(&line)?;

    KeyringCredentials::default().store(token)?;
    println!("✓ API key stored in the system keyring");
    if std::env::var_os(API_KEY_ENV).is_some() {
        println!("Note: {API_KEY_ENV} is set and takes precedence over the keyring.");
    }
    Ok(())
}

pub fn run_deauth() -> Result<(), Box<dyn Error>> {
    if KeyringCredentials::default().remove()? {
        println!("✓ API key removed from the system keyring");
    } else {
        println!("No API key was stored.");
    }
    Ok(())
}

fn parse_token(line: &str) -> Result<&str, Box<dyn Error>> {
    let token = line.trim();
    if token.is_empty() {
        return Err("API key cannot be empty".into());
    }
    Ok(token)
}
