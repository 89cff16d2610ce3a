/// Errors raised while discovering or polling devices.
///
/// # Examples
///
/// ```rust
/// use snmpmon_collector::error::CollectorError;
///
/// let err = CollectorError::UnsupportedMib("ifFoo".to_string());
/// assert!(err.to_string().contains("ifFoo"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The secret store has no usable entry for the community. Callers keep
    /// the device for host status but skip its interfaces.
    #[error("security data unavailable for community '{community}': {reason}")]
    SecurityDataUnavailable { community: String, reason: String },

    /// Obfuscated secret could not be decoded.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// A directory query failed as a whole (network, non-200 or malformed body).
    #[error("directory query on table '{table}' failed: {reason}")]
    Directory { table: String, reason: String },

    /// Session parameters are incomplete.
    #[error("SNMP validation failed: {0}")]
    Validation(String),

    #[error("unsupported {kind} protocol: {protocol}")]
    UnsupportedProtocol { kind: &'static str, protocol: String },

    /// The MIB is not part of the metric catalogue.
    #[error("unsupported metric: {0}")]
    UnsupportedMib(String),

    #[error("no metrics requested")]
    NoMibs,

    /// Error reported by the SNMP stack.
    #[error("SNMP error: {0}")]
    Snmp(#[from] Box<async_snmp::Error>),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CollectorError>;
