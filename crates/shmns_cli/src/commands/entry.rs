//! Single-entry commands.

use super::{CommandResult, Target};

/// Stores `value` under `entry`.
pub fn set(target: &Target, namespace: &str, entry: &str, value: &[u8]) -> CommandResult<bool> {
    let stored = target.with_namespace(namespace, |ns| ns.set(entry, value))?;
    if !stored {
        return Err(format!("namespace `{namespace}` is full").into());
    }
    println!("stored");
    Ok(true)
}

/// Prints the value of `entry`. Returns false if there is none.
pub fn get(target: &Target, namespace: &str, entry: &str) -> CommandResult<bool> {
    match target.with_namespace(namespace, |ns| ns.get(entry))? {
        Some(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(true)
        }
        None => {
            eprintln!("entry `{entry}` not found");
            Ok(false)
        }
    }
}

/// Removes `entry`. Returns false if there was none.
pub fn remove(target: &Target, namespace: &str, entry: &str) -> CommandResult<bool> {
    let removed = target.with_namespace(namespace, |ns| ns.remove(entry))?;
    if removed {
        println!("removed");
    } else {
        eprintln!("entry `{entry}` not found");
    }
    Ok(removed)
}
