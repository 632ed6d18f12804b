//! Info command implementation.

use super::{CommandResult, Target};
use serde::Serialize;

/// Namespace statistics.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// Namespace name.
    pub name: String,
    /// Number of entries.
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Handles attached, including the one this command opened.
    pub refcount: i64,
    /// Bytes used by the directory segment.
    pub directory_bytes: usize,
}

/// Runs the info command.
pub fn run(target: &Target, namespace: &str, format: &str) -> CommandResult<bool> {
    let info = target.with_namespace(namespace, |ns| ns.info())?;
    let result = InfoResult {
        directory_bytes: shmns_core::directory_size(info.capacity).unwrap_or(usize::MAX),
        name: info.name,
        size: info.size,
        capacity: info.capacity,
        refcount: info.refcount,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(true)
}

fn print_text_output(result: &InfoResult) {
    println!("Namespace: {}", result.name);
    println!();
    println!("Entries:");
    println!("  Size:      {}", result.size);
    println!("  Capacity:  {}", result.capacity);
    println!();
    println!("Handles:     {}", result.refcount);
    println!("Directory:   {}", format_size(result.directory_bytes));
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
