//! Settings loading from disk.

use crate::core::ConfigResult;
use crate::settings::schema::RegistrySettings;

use std::fs;
use std::path::Path;

impl RegistrySettings {
    /// Parses and validates settings from a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings: RegistrySettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;

        tracing::debug!(
            path = %path.display(),
            services = settings.services.len(),
            "Loaded circuit breaker settings"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigError;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [defaults]
            recovery_timeout_ms = 5000

            [services.payments]
            profile = "external_api"
            "#
        )
        .unwrap();

        let settings = RegistrySettings::load(file.path()).unwrap();
        assert_eq!(settings.default_config().recovery_timeout, Duration::from_secs(5));
        assert_eq!(
            settings.service_config("payments").recovery_timeout,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RegistrySettings::load(dir.path().join("breakers.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = RegistrySettings::from_toml_str("[defaults\nfailure_threshold = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_defaults_rejected() {
        let result = RegistrySettings::from_toml_str("[defaults]\nfailure_threshold = 0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "failure_threshold", .. })
        ));
    }
}
