//! Zone parsing configuration.

/// TTL applied when a file has neither `$TTL` nor an earlier explicit TTL.
pub const DEFAULT_TTL: u32 = 3600;

/// Settings that seed the parser state of every zone file.
///
/// # Example
///
/// ```
/// use zone_rebind::ParseConfig;
///
/// let config = ParseConfig::new()
///     .with_origin("example.com.")
///     .with_default_ttl(300);
///
/// assert_eq!(config.origin.as_deref(), Some("example.com."));
/// assert_eq!(config.default_ttl, 300);
/// ```
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Initial `$ORIGIN`. Relative owner names before any `$ORIGIN`
    /// directive are rejected when this is `None`.
    pub origin: Option<String>,

    /// Fallback TTL for records without an explicit or inherited one.
    pub default_ttl: u32,
}

impl ParseConfig {
    /// Creates a config with no origin and a TTL of [`DEFAULT_TTL`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            origin: None,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Sets the initial origin. A missing trailing dot is added.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let mut origin = origin.into();
        if !origin.ends_with('.') {
            origin.push('.');
        }
        self.origin = Some(origin);
        self
    }

    /// Overrides the fallback TTL.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: u32) -> Self {
        self.default_ttl = ttl;
        self
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self::new()
    }
}
