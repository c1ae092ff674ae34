//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file.
    ///
    /// Validation is left to the caller since command-line flags may still
    /// fill in missing values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}`.
    ///
    /// An unset variable without a default keeps its placeholder.
    fn expand_env_vars(content: &str) -> String {
        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
            Ok(re) => re,
            Err(_) => return content.to_string(),
        };

        re.replace_all(content, |cap: &regex_lite::Captures<'_>| {
            match std::env::var(&cap[1]) {
                Ok(value) => value,
                Err(_) => cap
                    .get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_else(|| cap[0].to_string()),
            }
        })
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("PIWIGO_LOADER_TEST_VAR", "test_value");
        let content = "key: ${PIWIGO_LOADER_TEST_VAR}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("PIWIGO_LOADER_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_default_and_missing() {
        let content = "a: ${PIWIGO_LOADER_UNSET:-fallback}\nb: ${PIWIGO_LOADER_UNSET}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, "a: fallback\nb: ${PIWIGO_LOADER_UNSET}");
    }

    #[test]
    fn test_parse() {
        let config = ConfigLoader::parse(
            r#"
gallery:
  url: "https://gallery.example.com"
  username: admin
  password: "${PIWIGO_LOADER_NO_SUCH_VAR:-hunter2}"
upload:
  chunk_size_kb: 256
"#,
        )
        .unwrap();

        assert_eq!(config.gallery.url, "https://gallery.example.com");
        assert_eq!(config.gallery.password, "hunter2");
        assert_eq!(config.upload.chunk_size_kb, Some(256));
        assert_eq!(config.upload.existence_batch_size, 100);
    }
}
