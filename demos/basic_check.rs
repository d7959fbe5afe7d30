//! Basic certificate checking example.
//!
//! Checks one host with the debug dump turned on and prints the report the
//! way the command line tool does, followed by a few fields of the dump.
//!
//! Run with: cargo run --example basic_check -- github.com

use std::io;

use certwatch::output::write_report;
use certwatch::{CheckOptions, Checker};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args().nth(1).unwrap_or_else(|| "github.com".to_string());
    let options = CheckOptions {
        debug: true,
        ..CheckOptions::default()
    };

    let checker = Checker::new(options)?;
    let result = checker.check(&host);
    write_report(&mut io::stdout(), &result)?;

    if let Some(details) = &result.details {
        println!();
        println!("Serial Number: {}", details.serial_number);
        println!("Valid from: {}", details.not_before);
        println!("Valid to: {}", details.not_after);
        println!("Extensions:");
        for (name, ext) in &details.extensions {
            println!("  - {} ({}, critical: {})", name, ext.oid, ext.critical);
        }
    }

    Ok(())
}
