//! Configuration file handling.
//!
//! The configuration is a small JSON document shared by both roles:
//!
//! ```json
//! { "server": "10.0.0.2", "port": ":8080", "savePath": "/srv/uploads" }
//! ```
//!
//! An absent or empty `server` selects the server role.

use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Which side of a transfer this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: Option<String>,
    pub port: String,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
}

impl Config {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("open {} file error: {}", path.display(), e))
        })?;
        Self::parse(&data)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(data)
            .map_err(|e| SyncError::Config(format!("unmarshal json error: {}", e)))?;
        if config.port.trim().is_empty() {
            return Err(SyncError::Config("port must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn role(&self) -> Role {
        match self.server.as_deref() {
            None | Some("") => Role::Server,
            Some(_) => Role::Client,
        }
    }

    /// Address the server listens on.
    ///
    /// `":8080"` and `"8080"` bind every interface; a full `"host:port"` is
    /// used verbatim.
    pub fn listen_addr(&self) -> String {
        let port = self.port.trim();
        if port.starts_with(':') {
            format!("0.0.0.0{}", port)
        } else if port.contains(':') {
            port.to_string()
        } else {
            format!("0.0.0.0:{}", port)
        }
    }

    /// Address the client dials. A port beginning with `:` is appended to
    /// the host as-is.
    pub fn connect_addr(&self) -> Result<String> {
        let host = self
            .server
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SyncError::Config("no server address configured".to_string()))?;
        let port = self.port.trim();
        if port.starts_with(':') {
            Ok(format!("{}{}", host, port))
        } else {
            Ok(format!("{}:{}", host, port))
        }
    }

    /// Save root with `~` expanded. Defaults to the working directory.
    pub fn save_root(&self) -> PathBuf {
        match &self.save_path {
            Some(p) => expand_tilde(p),
            None => PathBuf::from("."),
        }
    }
}

/// Expand tilde (~) in paths to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_server_is_server_role() {
        let config = Config::parse(r#"{"server": "", "port": ":8080"}"#).unwrap();
        assert_eq!(config.role(), Role::Server);

        let config = Config::parse(r#"{"port": ":8080", "savePath": "/srv"}"#).unwrap();
        assert_eq!(config.role(), Role::Server);
        assert_eq!(config.save_root(), PathBuf::from("/srv"));
    }

    #[test]
    fn test_non_empty_server_is_client_role() {
        let config = Config::parse(r#"{"server": "127.0.0.1", "port": ":8080"}"#).unwrap();
        assert_eq!(config.role(), Role::Client);
        assert_eq!(config.connect_addr().unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_port_forms() {
        let mut config = Config {
            server: Some("host".to_string()),
            port: "9000".to_string(),
            save_path: None,
        };
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.connect_addr().unwrap(), "host:9000");

        config.port = ":9000".to_string();
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");

        config.port = "127.0.0.1:9000".to_string();
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_port_rejected() {
        assert!(matches!(
            Config::parse(r#"{"server": "x"}"#),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            Config::parse(r#"{"port": "  "}"#),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"port": ":7000", "savePath": "~/uploads"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, ":7000");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.save_root(), home.join("uploads"));
        }
    }
}
