use std::time::Duration;

use serde::Deserialize;

use crate::codec::DEFAULT_MAX_HEADER_BYTES;

const DEFAULT_PROCESSING_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_MAX_STDERR_BYTES: usize = 64 * 1024;

/// Settings shared by every request a [`CgiGateway`](crate::gateway::CgiGateway) serves.
///
/// Built either through [`GatewayConfig::builder`] or deserialized; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Budget for a whole request, subprocess exit included.
    pub processing_timeout_ms: u64,
    /// Log every line the CGI program writes to stderr.
    pub log_stderr: bool,
    /// Stderr bytes retained for failure diagnostics.
    pub max_stderr_bytes: usize,
    /// Limit for the CGI response header block.
    pub max_header_bytes: usize,
    /// Value of `SERVER_SOFTWARE`.
    pub server_software: String,
    /// Start the child from the gateway's own environment.
    pub inherit_env: bool,
    /// Variables copied from the gateway's environment when `inherit_env` is off.
    pub env_passthrough: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            processing_timeout_ms: DEFAULT_PROCESSING_TIMEOUT_MS,
            log_stderr: false,
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            server_software: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            inherit_env: true,
            env_passthrough: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder { config: Self::default() }
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }
}

#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    #[must_use]
    pub fn processing_timeout(mut self, timeout: Duration) -> Self {
        self.config.processing_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn log_stderr(mut self, log_stderr: bool) -> Self {
        self.config.log_stderr = log_stderr;
        self
    }

    #[must_use]
    pub fn max_stderr_bytes(mut self, max_stderr_bytes: usize) -> Self {
        self.config.max_stderr_bytes = max_stderr_bytes;
        self
    }

    #[must_use]
    pub fn max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.config.max_header_bytes = max_header_bytes;
        self
    }

    #[must_use]
    pub fn server_software<S: Into<String>>(mut self, server_software: S) -> Self {
        self.config.server_software = server_software.into();
        self
    }

    #[must_use]
    pub fn inherit_env(mut self, inherit_env: bool) -> Self {
        self.config.inherit_env = inherit_env;
        self
    }

    #[must_use]
    pub fn env_passthrough<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.env_passthrough = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}
