use crate::error::{CollectorError, Result};
use crate::SecurityResolver;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const CONF_PATH_ENV: &str = "NEDI_CONF_PATH";
pub const CONF_FILE_NAME: &str = "nedi.conf";
pub const ENCRYPT_KEY_ENV: &str = "NEDI_ENCRYPT_KEY";
pub const DEFAULT_ENCRYPT_KEY: &str = "change for more security";

const MARKER_ENCRYPTED: &str = "commsec";

/// SNMP credentials for one community. An empty auth protocol means v2c.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityData {
    pub name: String,
    pub auth_protocol: String,
    pub auth_password: String,
    pub privacy_protocol: String,
    pub privacy_password: String,
}

impl SecurityData {
    pub fn v2c(community: impl Into<String>) -> Self {
        Self {
            name: community.into(),
            ..Default::default()
        }
    }

    pub fn is_v3(&self) -> bool {
        !self.auth_protocol.is_empty()
    }
}

/// Byte-wise XOR obfuscation used by the directory tool for `commsec` lines.
///
/// Each byte is XORed with the reversed key, cycling over it; the same
/// operation encrypts and decrypts. Ciphertext is stored as lowercase hex.
///
/// ```
/// use snmpmon_collector::secdata::XorCipher;
///
/// let cipher = XorCipher::default();
/// assert_eq!(cipher.encrypt("groundworkdevelopment"), "1e0606071b07121c520e160a1b451e00164d00091a");
/// ```
#[derive(Debug, Clone)]
pub struct XorCipher {
    key: Vec<u8>,
}

impl Default for XorCipher {
    fn default() -> Self {
        Self::new(DEFAULT_ENCRYPT_KEY)
    }
}

impl XorCipher {
    /// An empty key falls back to [`DEFAULT_ENCRYPT_KEY`].
    pub fn new(key: &str) -> Self {
        let key = if key.is_empty() { DEFAULT_ENCRYPT_KEY } else { key };
        Self {
            key: key.bytes().rev().collect(),
        }
    }

    /// Key from `NEDI_ENCRYPT_KEY`, or the default key when unset.
    pub fn from_env() -> Self {
        match std::env::var(ENCRYPT_KEY_ENV) {
            Ok(key) => Self::new(&key),
            Err(_) => Self::default(),
        }
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }

    pub fn encrypt(&self, plain: &str) -> String {
        hex::encode(self.apply(plain.as_bytes()))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let bytes = hex::decode(encrypted.trim())
            .map_err(|e| CollectorError::Cipher(format!("invalid hex: {e}")))?;
        String::from_utf8(self.apply(&bytes))
            .map_err(|e| CollectorError::Cipher(format!("decrypted value is not UTF-8: {e}")))
    }
}

/// Columns of a community line, in file order.
#[derive(Debug, Default, PartialEq, Eq)]
struct CommunityLine {
    marker: String,
    name: String,
    auth_protocol: String,
    auth_password: String,
    privacy_protocol: String,
    privacy_password: String,
}

impl CommunityLine {
    /// Split on tabs, strip spaces inside each field and drop empty fields.
    fn parse(line: &str) -> Self {
        let mut fields = line
            .split('\t')
            .map(|f| f.replace(' ', ""))
            .filter(|f| !f.is_empty());
        let mut next = || fields.next().unwrap_or_default();
        Self {
            marker: next(),
            name: next(),
            auth_protocol: next(),
            auth_password: next(),
            privacy_protocol: next(),
            privacy_password: next(),
        }
    }
}

/// Reads SNMP credentials from the directory tool's `nedi.conf`.
pub struct NediConfResolver {
    path: PathBuf,
    cipher: XorCipher,
}

impl NediConfResolver {
    pub fn new(conf_dir: impl AsRef<Path>, cipher: XorCipher) -> Self {
        Self {
            path: conf_dir.as_ref().join(CONF_FILE_NAME),
            cipher,
        }
    }

    /// Directory from `NEDI_CONF_PATH`, cipher key from `NEDI_ENCRYPT_KEY`.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var(CONF_PATH_ENV)
            .map_err(|_| CollectorError::Config(format!("{CONF_PATH_ENV} is not set")))?;
        Ok(Self::new(dir, XorCipher::from_env()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(community: &str, reason: impl Into<String>) -> CollectorError {
        CollectorError::SecurityDataUnavailable {
            community: community.to_string(),
            reason: reason.into(),
        }
    }

    /// Find the first line for `community` in `content`.
    pub fn parse(&self, community: &str, content: &str) -> Result<SecurityData> {
        let pattern = format!(r"^comm(sec)?\s+{}(\z|\s+)", regex::escape(community));
        let re = Regex::new(&pattern).map_err(|e| Self::unavailable(community, e.to_string()))?;

        let line = content
            .lines()
            .find(|line| re.is_match(line))
            .ok_or_else(|| Self::unavailable(community, "no entry for community"))?;
        let mut columns = CommunityLine::parse(line);

        if columns.marker == MARKER_ENCRYPTED {
            for password in [&mut columns.auth_password, &mut columns.privacy_password] {
                if !password.is_empty() {
                    let decrypted = self.cipher.decrypt(password).map_err(|e| {
                        tracing::warn!(community, error = %e, "Failed to decrypt community password");
                        Self::unavailable(community, "password decryption failed")
                    })?;
                    *password = decrypted;
                }
            }
        }

        Ok(SecurityData {
            name: columns.name,
            auth_protocol: columns.auth_protocol,
            auth_password: columns.auth_password,
            privacy_protocol: columns.privacy_protocol,
            privacy_password: columns.privacy_password,
        })
    }
}

#[async_trait]
impl SecurityResolver for NediConfResolver {
    async fn resolve(&self, community: &str) -> Result<SecurityData> {
        tracing::debug!(path = %self.path.display(), community, "Reading secret store");
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Self::unavailable(community, format!("cannot read {}: {e}", self.path.display()))
        })?;
        self.parse(community, &content)
    }
}
