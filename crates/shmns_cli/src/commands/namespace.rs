//! Whole-namespace commands.

use super::{CommandResult, Target};

/// Removes every entry.
pub fn clear(target: &Target, namespace: &str) -> CommandResult<bool> {
    target.with_namespace(namespace, |ns| ns.clear())?;
    println!("cleared");
    Ok(true)
}

/// Prints entry names in slot order.
pub fn list(target: &Target, namespace: &str) -> CommandResult<bool> {
    for name in target.with_namespace(namespace, |ns| ns.names())? {
        println!("{name}");
    }
    Ok(true)
}
