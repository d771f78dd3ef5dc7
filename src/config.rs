//! Connection configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Controller connection settings derived from defaults, configuration
/// files, and environment variables. CLI flags are applied on top through
/// [`ConnectionConfig::with_overrides`].
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNAPCTL",
    discovery(
        app_name = "snapctl",
        env_var = "SNAPCTL_CONFIG_PATH",
        config_file_name = "snapctl.toml",
        dotfile_name = ".snapctl.toml",
        project_file_name = "snapctl.toml"
    )
)]
pub struct ConnectionConfig {
    /// IP address or hostname of the storage virtual machine.
    pub host: Option<String>,
    /// Account used for basic authentication.
    pub username: Option<String>,
    /// Password for the account.
    pub password: Option<String>,
    /// Verify the controller's TLS certificate. Off by default because
    /// management interfaces commonly present self-signed certificates.
    #[ortho_config(default = false)]
    pub verify_tls: bool,
    /// Per-request HTTP timeout in seconds.
    #[ortho_config(default = 60)]
    pub request_timeout_secs: u64,
    /// Delay between job state polls in milliseconds.
    #[ortho_config(default = 2000)]
    pub job_poll_interval_ms: u64,
    /// Optional upper bound for job waits in seconds. Unset means wait until
    /// the controller reports the job finished.
    pub job_timeout_secs: Option<u64>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("job_poll_interval_ms", &self.job_poll_interval_ms)
            .field("job_timeout_secs", &self.job_timeout_secs)
            .finish()
    }
}

/// Connection values supplied on the command line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionOverrides {
    /// Value of `--na`.
    pub host: Option<String>,
    /// Value of `--user`.
    pub username: Option<String>,
    /// Value of `--pass`.
    pub password: Option<String>,
}

/// Validated settings used to open a backend session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// IP address or hostname of the storage virtual machine.
    pub host: String,
    /// Account used for basic authentication.
    pub username: String,
    /// Password for the account.
    pub password: String,
    /// Whether the TLS certificate is verified.
    pub verify_tls: bool,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Delay between job state polls.
    pub job_poll_interval: Duration,
    /// Upper bound for job waits, if any.
    pub job_timeout: Option<Duration>,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("request_timeout", &self.request_timeout)
            .field("job_poll_interval", &self.job_poll_interval)
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    flag: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        flag: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            flag,
        }
    }
}

const HOST_FIELD: FieldMetadata =
    FieldMetadata::new("storage VM address", "SNAPCTL_HOST", "host", "--na");
const USERNAME_FIELD: FieldMetadata =
    FieldMetadata::new("username", "SNAPCTL_USERNAME", "username", "--user");
const PASSWORD_FIELD: FieldMetadata =
    FieldMetadata::new("password", "SNAPCTL_PASSWORD", "password", "--pass");

impl ConnectionConfig {
    fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<String, ConfigError> {
        match value.map(str::trim) {
            Some(present) if !present.is_empty() => Ok(present.to_owned()),
            _ => Err(ConfigError::MissingField(format!(
                "missing {}: pass {}, set {}, or add {} to snapctl.toml",
                metadata.description, metadata.flag, metadata.env_var, metadata.toml_key
            ))),
        }
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("snapctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies command-line values over loaded ones. Absent overrides keep
    /// the loaded value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConnectionOverrides) -> Self {
        if overrides.host.is_some() {
            self.host = overrides.host;
        }
        if overrides.username.is_some() {
            self.username = overrides.username;
        }
        if overrides.password.is_some() {
            self.password = overrides.password;
        }
        self
    }

    /// Validates the merged configuration and produces session settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the address or credentials
    /// are missing and [`ConfigError::InvalidValue`] when a duration is zero.
    pub fn settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let host = Self::require_field(self.host.as_deref(), &HOST_FIELD)?;
        let username = Self::require_field(self.username.as_deref(), &USERNAME_FIELD)?;
        let password = Self::require_field(self.password.as_deref(), &PASSWORD_FIELD)?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "request_timeout_secs must be greater than zero",
            )));
        }
        if self.job_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "job_poll_interval_ms must be greater than zero",
            )));
        }

        Ok(ConnectionSettings {
            host,
            username,
            password,
            verify_tls: self.verify_tls,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            job_poll_interval: Duration::from_millis(self.job_poll_interval_ms),
            job_timeout: self.job_timeout_secs.map(Duration::from_secs),
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value outside its accepted range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn complete() -> ConnectionConfig {
        ConnectionConfig {
            host: Some(String::from("svm-mgmt.example.net")),
            username: Some(String::from("vsadmin")),
            password: Some(String::from("secret")),
            verify_tls: false,
            request_timeout_secs: 60,
            job_poll_interval_ms: 2000,
            job_timeout_secs: None,
        }
    }

    #[rstest]
    fn settings_carry_unbounded_job_wait_by_default(complete: ConnectionConfig) {
        let settings = complete.settings().expect("settings");
        assert_eq!(settings.job_timeout, None);
        assert_eq!(settings.job_poll_interval, Duration::from_secs(2));
        assert!(!settings.verify_tls);
    }

    #[rstest]
    #[case::host(
        ConnectionConfig { host: None, ..complete() },
        "--na"
    )]
    #[case::username(
        ConnectionConfig { username: Some(String::from("  ")), ..complete() },
        "SNAPCTL_USERNAME"
    )]
    #[case::password(
        ConnectionConfig { password: None, ..complete() },
        "SNAPCTL_PASSWORD"
    )]
    fn settings_name_every_source_for_missing_fields(
        #[case] config: ConnectionConfig,
        #[case] needle: &str,
    ) {
        let err = config.settings().expect_err("field is required");
        let ConfigError::MissingField(ref message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(message.contains(needle), "message: {message}");
        assert!(message.contains("snapctl.toml"), "message: {message}");
    }

    #[rstest]
    fn overrides_replace_only_supplied_values(complete: ConnectionConfig) {
        let merged = complete.with_overrides(ConnectionOverrides {
            host: Some(String::from("10.0.0.5")),
            ..ConnectionOverrides::default()
        });
        assert_eq!(merged.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(merged.username.as_deref(), Some("vsadmin"));
    }

    #[rstest]
    fn zero_poll_interval_is_rejected(complete: ConnectionConfig) {
        let config = ConnectionConfig {
            job_poll_interval_ms: 0,
            ..complete
        };
        assert!(matches!(
            config.settings(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[rstest]
    fn debug_output_redacts_password(complete: ConnectionConfig) {
        let rendered = format!("{complete:?}");
        assert!(!rendered.contains("secret"), "rendered: {rendered}");
        let settings = complete.settings().expect("settings");
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
