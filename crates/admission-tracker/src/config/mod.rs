use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::admission::domain::{CatalogError, ProgramCatalog};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admission: AdmissionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment == AppEnvironment::Development,
            },
            admission: AdmissionConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Log filter controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Program catalog and the wall-clock budgets that uploads and allocations are held to.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub catalog: ProgramCatalog,
    pub upload_budget: Duration,
    pub allocation_budget: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            catalog: ProgramCatalog::standard(),
            upload_budget: Duration::from_millis(5_000),
            allocation_budget: Duration::from_millis(3_000),
        }
    }
}

impl AdmissionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let catalog = match env::var("ADMISSION_PROGRAMS_CSV") {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path.trim());
                let file = std::fs::File::open(&path).map_err(|source| {
                    ConfigError::CatalogUnreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                ProgramCatalog::from_reader(file)
                    .map_err(|source| ConfigError::InvalidCatalog { path, source })?
            }
            _ => defaults.catalog,
        };

        Ok(Self {
            catalog,
            upload_budget: budget_from_env("ADMISSION_UPLOAD_BUDGET_MS", defaults.upload_budget)?,
            allocation_budget: budget_from_env(
                "ADMISSION_ALLOCATION_BUDGET_MS",
                defaults.allocation_budget,
            )?,
        })
    }
}

fn budget_from_env(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidBudget { var }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidBudget {
        var: &'static str,
    },
    CatalogUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    InvalidCatalog {
        path: PathBuf,
        source: CatalogError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBudget { var } => {
                write!(f, "{var} must be a whole number of milliseconds")
            }
            ConfigError::CatalogUnreadable { path, .. } => {
                write!(f, "cannot open program catalog {}", path.display())
            }
            ConfigError::InvalidCatalog { path, source } => {
                write!(f, "program catalog {} is invalid: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidBudget { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::CatalogUnreadable { source, .. } => Some(source),
            ConfigError::InvalidCatalog { source, .. } => Some(source),
        }
    }
}
