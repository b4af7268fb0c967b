//! Configuration management.

use anyhow::{bail, Context};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use sse_mcp_types::{DEFAULT_ISSUER, DEFAULT_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::credential::{
    CredentialAuthority, CredentialError, DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL,
};

/// Identity embedded in tokens requested without a username.
pub const DEFAULT_USERNAME: &str = "aniket";

/// Prefix of structured environment overrides, e.g. `SSE_MCP_SERVER__PORT`.
const ENV_PREFIX: &str = "SSE_MCP_";

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: IpAddr,
    #[serde(default = "default_port")]
    port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthConfig {
    /// HMAC secret used to sign credentials. Required.
    jwt_secret: Option<String>,
    #[serde(default = "default_issuer")]
    issuer: String,
    #[serde(default = "default_token_ttl_secs")]
    token_ttl_secs: u64,
    #[serde(default = "default_username")]
    default_username: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: default_issuer(),
            token_ttl_secs: default_token_ttl_secs(),
            default_username: default_username(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL.as_secs()
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

/// Values given on the command line. They take precedence over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub jwt_secret: Option<String>,
    pub log_level: Option<String>,
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Address to bind
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins (empty allows any)
    pub cors_allowed_origins: Vec<String>,
    /// Credential signing secret
    pub jwt_secret: String,
    /// Issuer stamped into and required of credentials
    pub issuer: String,
    /// Credential lifetime
    pub token_ttl: Duration,
    /// Identity used when a token request names none
    pub default_username: String,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_ttl", &self.token_ttl)
            .field("default_username", &self.default_username)
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `config.toml` in user config directory (~/.config/sse-mcp-server/ on Linux)
    /// 2. `.sse-mcp.toml` in current directory
    /// 3. the file named by `--config`
    ///
    /// Environment variables are `SSE_MCP_<SECTION>__<KEY>`, plus the plain
    /// `PORT` and `JWT_SECRET` accepted at lower priority.
    ///
    /// Fails if no signing secret is configured anywhere.
    pub fn from_figment(cli: CliOverrides) -> anyhow::Result<Self> {
        // Find config file paths
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".sse-mcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "sse-mcp-server")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Build figment with priority: defaults < user config < local config < explicit file < env vars < CLI args
        let mut figment = Figment::new();

        // 1. Start with defaults
        figment = figment.merge(Serialized::defaults(ConfigFile {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }));

        // 2. Merge user config file if it exists
        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // 3. Merge local config file if it exists
        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // 4. Merge an explicitly named config file, which must exist
        if let Some(ref path) = cli.config_file {
            if !path.exists() {
                bail!("Config file {} does not exist", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // 5. Merge plain environment variables
        figment = figment.merge(Env::raw().only(&["PORT", "JWT_SECRET"]).map(|key| {
            if key.as_str().eq_ignore_ascii_case("port") {
                "server.port".into()
            } else {
                "auth.jwt_secret".into()
            }
        }));

        // 6. Merge structured environment variables (SSE_MCP_* prefix)
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        // 7. Merge CLI arguments (highest priority)
        if let Some(host) = cli.host {
            figment = figment.merge(Serialized::default("server.host", host));
        }
        if let Some(port) = cli.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        if let Some(ref secret) = cli.jwt_secret {
            figment = figment.merge(Serialized::default("auth.jwt_secret", secret));
        }
        if let Some(ref level) = cli.log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }

        // Extract the configuration
        let config_file: ConfigFile = figment
            .extract()
            .context("Failed to load configuration")?;

        Self::from_file(config_file)
    }

    /// Validate extracted settings.
    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        let jwt_secret = match file.auth.jwt_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!(
                "No JWT signing secret configured: set JWT_SECRET, SSE_MCP_AUTH__JWT_SECRET, \
                 --jwt-secret or [auth] jwt_secret"
            ),
        };
        if file.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if file.auth.token_ttl_secs > MAX_TOKEN_TTL.as_secs() {
            bail!(
                "auth.token_ttl_secs must be at most {} (one year)",
                MAX_TOKEN_TTL.as_secs()
            );
        }
        if file.auth.default_username.is_empty() {
            bail!("auth.default_username must not be empty");
        }

        Ok(Self {
            host: file.server.host,
            port: file.server.port,
            cors_allowed_origins: file.server.cors_allowed_origins,
            jwt_secret,
            issuer: file.auth.issuer,
            token_ttl: Duration::from_secs(file.auth.token_ttl_secs),
            default_username: file.auth.default_username,
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }

    /// Address the server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Build the credential authority described by this configuration.
    pub fn credential_authority(&self) -> Result<CredentialAuthority, CredentialError> {
        CredentialAuthority::new(&self.jwt_secret, self.issuer.clone(), self.token_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "PORT",
        "JWT_SECRET",
        "SSE_MCP_SERVER__PORT",
        "SSE_MCP_AUTH__JWT_SECRET",
        "SSE_MCP_AUTH__TOKEN_TTL_SECS",
    ];

    /// Run `f` in a fresh temp directory with a clean environment.
    fn isolated<T>(f: impl FnOnce(&TempDir) -> T) -> T {
        let saved: Vec<_> = ENV_VARS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();
        for k in ENV_VARS {
            std::env::remove_var(k);
        }

        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = f(&temp_dir);

        // Restore (restore dir before temp_dir is dropped, ignore errors)
        let _ = std::env::set_current_dir(&original_dir);
        for (k, v) in saved {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
        result
    }

    #[test]
    #[serial]
    fn test_missing_secret_fails_fast() {
        let result = isolated(|_| Config::from_figment(CliOverrides::default()));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("JWT"), "unexpected error: {}", err);
    }

    #[test]
    #[serial]
    fn test_empty_secret_fails_fast() {
        let result = isolated(|_| {
            std::env::set_var("JWT_SECRET", "");
            Config::from_figment(CliOverrides::default())
        });
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_defaults_with_cli_secret() {
        let config = isolated(|_| {
            Config::from_figment(CliOverrides {
                jwt_secret: Some("cli-secret".to_string()),
                ..Default::default()
            })
        })
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.issuer, DEFAULT_ISSUER);
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.default_username, DEFAULT_USERNAME);
        assert_eq!(config.jwt_secret, "cli-secret");
        assert!(config.credential_authority().is_ok());
    }

    #[test]
    #[serial]
    fn test_legacy_env_vars() {
        let config = isolated(|_| {
            std::env::set_var("JWT_SECRET", "env-secret");
            std::env::set_var("PORT", "4100");
            Config::from_figment(CliOverrides::default())
        })
        .unwrap();

        assert_eq!(config.jwt_secret, "env-secret");
        assert_eq!(config.port, 4100);
    }

    #[test]
    #[serial]
    fn test_local_config_file() {
        let config = isolated(|dir| {
            fs::write(
                dir.path().join(".sse-mcp.toml"),
                r#"
[server]
port = 7777

[auth]
jwt_secret = "file-secret"
token_ttl_secs = 60
"#,
            )
            .unwrap();
            Config::from_figment(CliOverrides::default())
        })
        .unwrap();

        assert_eq!(config.port, 7777);
        assert_eq!(config.jwt_secret, "file-secret");
        assert_eq!(config.token_ttl, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_priority_chain() {
        let config = isolated(|dir| {
            fs::write(
                dir.path().join(".sse-mcp.toml"),
                "[server]\nport = 7777\n\n[auth]\njwt_secret = \"file-secret\"\n",
            )
            .unwrap();
            std::env::set_var("PORT", "8000");
            std::env::set_var("SSE_MCP_SERVER__PORT", "8888");
            Config::from_figment(CliOverrides {
                port: Some(9999),
                ..Default::default()
            })
        })
        .unwrap();

        // CLI beats structured env beats plain env beats file
        assert_eq!(config.port, 9999);
        assert_eq!(config.jwt_secret, "file-secret");
    }

    #[test]
    #[serial]
    fn test_structured_env_beats_plain_env() {
        let config = isolated(|_| {
            std::env::set_var("JWT_SECRET", "plain-secret");
            std::env::set_var("SSE_MCP_AUTH__JWT_SECRET", "structured-secret");
            std::env::set_var("PORT", "8000");
            std::env::set_var("SSE_MCP_SERVER__PORT", "8888");
            Config::from_figment(CliOverrides::default())
        })
        .unwrap();

        assert_eq!(config.jwt_secret, "structured-secret");
        assert_eq!(config.port, 8888);
    }

    #[test]
    #[serial]
    fn test_explicit_config_file_must_exist() {
        let result = isolated(|dir| {
            Config::from_figment(CliOverrides {
                config_file: Some(dir.path().join("missing.toml")),
                jwt_secret: Some("s".to_string()),
                ..Default::default()
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_file(ConfigFile {
            server: ServerConfig::default(),
            auth: AuthConfig {
                jwt_secret: Some("super-secret".to_string()),
                ..Default::default()
            },
            logging: LoggingConfig::default(),
        })
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert_eq!(config.socket_addr().port(), DEFAULT_PORT);
    }

    #[test]
    fn test_token_ttl_bounds() {
        let with_ttl = |token_ttl_secs| {
            Config::from_file(ConfigFile {
                server: ServerConfig::default(),
                auth: AuthConfig {
                    jwt_secret: Some("s".to_string()),
                    token_ttl_secs,
                    ..Default::default()
                },
                logging: LoggingConfig::default(),
            })
        };

        assert!(with_ttl(0).is_err());
        assert!(with_ttl(u64::MAX).is_err());
        assert!(with_ttl(MAX_TOKEN_TTL.as_secs() + 1).is_err());
        assert_eq!(
            with_ttl(MAX_TOKEN_TTL.as_secs()).unwrap().token_ttl,
            MAX_TOKEN_TTL
        );
    }
}
