//! Command-line flags layered over the configuration file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{EchoConfig, OutputFormat};
use crate::config::validation::validate_config;
use crate::handlers::help::USAGE;

/// Startup flags for the echo server.
#[derive(Debug, Parser)]
#[command(name = "http-echo-server")]
#[command(about = "HTTP echo server with fault injection", long_about = None)]
#[command(after_help = USAGE)]
pub struct CliArgs {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. ":8088" or "127.0.0.1:8088".
    #[arg(short = 'l', long = "listen")]
    pub listen: Option<String>,

    /// Static response body replacing the echoed request.
    #[arg(long)]
    pub resp: Option<String>,

    /// Default response content type.
    #[arg(long = "ct")]
    pub content_type: Option<String>,

    /// Default output format when a request omits `type`.
    #[arg(long = "type", value_enum)]
    pub format: Option<CliFormat>,

    /// Log request headers with every completed request.
    #[arg(long = "lh")]
    pub log_headers: bool,

    /// Default response status code; 0 leaves it unset.
    #[arg(long)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    Plain,
    Json,
    Xml,
}

impl From<CliFormat> for OutputFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Plain => OutputFormat::Plain,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Xml => OutputFormat::Xml,
        }
    }
}

impl CliArgs {
    /// Build the effective configuration: file (or defaults), then flags.
    pub fn into_config(self) -> Result<EchoConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => EchoConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut EchoConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = normalize_bind_address(listen);
        }
        if let Some(body) = &self.resp {
            config.response.static_body = Some(body.clone()).filter(|b| !b.is_empty());
        }
        if let Some(content_type) = &self.content_type {
            config.response.default_content_type =
                Some(content_type.clone()).filter(|c| !c.is_empty());
        }
        if let Some(format) = self.format {
            config.response.default_format = Some(format.into());
        }
        if self.log_headers {
            config.observability.log_headers = true;
        }
        if let Some(status) = self.status {
            config.response.default_status = Some(status).filter(|&s| s != 0);
        }
    }
}

/// Expand the `:port` shorthand into a wildcard bind address.
pub fn normalize_bind_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
