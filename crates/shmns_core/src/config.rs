//! Namespace configuration.

/// Configuration for opening a namespace.
///
/// Nothing here decides which namespace is opened or which lock guards it;
/// both follow from the name alone, so handles opened with different
/// configurations still share one table and one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How many times `open` starts over after winning a lock that a
    /// closing process had already retired.
    pub open_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { open_attempts: 8 }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many times `open` may start over.
    #[must_use]
    pub const fn open_attempts(mut self, attempts: u32) -> Self {
        self.open_attempts = attempts;
        self
    }
}
