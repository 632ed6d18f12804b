//! CLI command implementations.
//!
//! Commands return `Ok(false)` when what they looked for was not there; the
//! binary turns that into exit code 1.

pub mod entry;
pub mod info;
pub mod namespace;

use shmns_core::{Config, Container, CoreResult};

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Where and how commands open namespaces.
pub struct Target {
    /// Configuration passed to every open.
    pub config: Config,
    /// Capacity used when a command creates the namespace.
    pub capacity: usize,
}

impl Target {
    /// Opens `namespace`, runs `op` against it, and closes it again.
    ///
    /// The handle is closed even if `op` fails.
    pub fn with_namespace<T>(
        &self,
        namespace: &str,
        op: impl FnOnce(&Container) -> CoreResult<T>,
    ) -> CommandResult<T> {
        let container =
            Container::open_with_config(namespace, self.capacity, self.config.clone())?;
        let result = op(&container);
        let outcome = container.close()?;
        tracing::debug!(namespace, ?outcome, "closed");
        Ok(result?)
    }
}
