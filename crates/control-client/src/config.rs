//! Control endpoint settings, read from the wrapper's `settings.ini`.
//!
//! Only two sections matter to us:
//!
//! ```ini
//! [tcp-server]
//! address = 127.0.0.1
//! port = 2001
//!
//! [auth]
//! password = hunter2
//! method = sha256
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing `{key}` in [{section}] of {}", path.display())]
    MissingKey {
        section: &'static str,
        key: &'static str,
        path: PathBuf,
    },

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("unknown auth method `{0}` (expected `plain` or `sha256`)")]
    UnknownMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Plain,
    Sha256,
}

impl FromStr for AuthMethod {
    type Err = ControlConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "sha256" => Ok(Self::Sha256),
            other => Err(ControlConfigError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password: String,
    pub method: AuthMethod,
}

impl AuthConfig {
    /// The credential actually sent on the wire: the password transformed
    /// by the configured method. The wrapper never sees the cleartext when
    /// a hashed method is configured.
    pub fn digest(&self) -> String {
        match self.method {
            AuthMethod::Plain => self.password.clone(),
            AuthMethod::Sha256 => {
                let hash = Sha256::digest(self.password.as_bytes());
                hash.iter().map(|b| format!("{:02x}", b)).collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub address: String,
    pub port: u16,
    pub auth: AuthConfig,
}

impl ControlConfig {
    pub fn load(path: &Path) -> Result<Self, ControlConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ControlConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ControlConfigError> {
        let mut section = String::new();
        let mut address = None;
        let mut port = None;
        let mut password = None;
        let mut method = None;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().to_string();
            match (section.as_str(), key) {
                ("tcp-server", "address") => address = Some(value),
                ("tcp-server", "port") => port = Some(value),
                ("auth", "password") => password = Some(value),
                ("auth", "method") => method = Some(value),
                _ => {}
            }
        }

        let missing = |section: &'static str, key: &'static str| ControlConfigError::MissingKey {
            section,
            key,
            path: path.to_path_buf(),
        };

        let address = address.ok_or_else(|| missing("tcp-server", "address"))?;
        let port = port.ok_or_else(|| missing("tcp-server", "port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ControlConfigError::InvalidPort(port))?;
        let password = password.ok_or_else(|| missing("auth", "password"))?;
        let method = method
            .ok_or_else(|| missing("auth", "method"))?
            .parse::<AuthMethod>()?;

        Ok(Self {
            address,
            port,
            auth: AuthConfig { password, method },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = "\
# wrapper settings
[tcp-server]
address = 127.0.0.1
port = 2001

[auth]
password = hunter2
method = sha256
";

    #[test]
    fn parses_full_settings() {
        let config = ControlConfig::parse(SETTINGS, Path::new("settings.ini")).unwrap();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 2001);
        assert_eq!(config.endpoint(), "127.0.0.1:2001");
        assert_eq!(config.auth.password, "hunter2");
        assert_eq!(config.auth.method, AuthMethod::Sha256);
    }

    #[test]
    fn missing_password_is_reported_with_section() {
        let content = "[tcp-server]\naddress = 127.0.0.1\nport = 2001\n[auth]\nmethod = plain\n";
        let err = ControlConfig::parse(content, Path::new("settings.ini")).unwrap_err();
        assert!(matches!(
            err,
            ControlConfigError::MissingKey {
                section: "auth",
                key: "password",
                ..
            }
        ));
    }

    #[test]
    fn bad_port_is_rejected() {
        let content = "[tcp-server]\naddress = 127.0.0.1\nport = lots\n[auth]\npassword = x\nmethod = plain\n";
        let err = ControlConfig::parse(content, Path::new("settings.ini")).unwrap_err();
        assert!(matches!(err, ControlConfigError::InvalidPort(_)));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let content =
            "[tcp-server]\naddress = 127.0.0.1\nport = 2001\n[auth]\npassword = x\nmethod = rot13\n";
        let err = ControlConfig::parse(content, Path::new("settings.ini")).unwrap_err();
        assert!(matches!(err, ControlConfigError::UnknownMethod(_)));
    }

    #[test]
    fn plain_digest_passes_the_password_through() {
        let auth = AuthConfig {
            password: "hunter2".into(),
            method: AuthMethod::Plain,
        };
        assert_eq!(auth.digest(), "hunter2");
    }

    #[test]
    fn sha256_digest_is_lowercase_hex() {
        let auth = AuthConfig {
            password: "hunter2".into(),
            method: AuthMethod::Sha256,
        };
        assert_eq!(
            auth.digest(),
            "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7"
        );
    }
}
