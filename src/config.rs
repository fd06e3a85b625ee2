//! Application settings.
//!
//! Settings are plain data deserialized from TOML. Every field has a default,
//! so an empty file (or no file at all) yields a working configuration:
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! max_request_size = 1048576
//! supported_charsets = ["UTF-8", "ISO-8859-1"]
//! default_charset = "UTF-8"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides [`Settings::bind`].
pub const BIND_ENV: &str = "HAVEN_BIND";

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Framework-wide settings shared by the server and every route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Address the server binds to.
    pub bind: String,
    /// Largest request (headers + body) buffered before answering `413`.
    pub max_request_size: usize,
    /// Charsets the application can produce, matched case-insensitively.
    pub supported_charsets: Vec<String>,
    /// Charset applied by [`Context::response`](crate::context::Context::response).
    pub default_charset: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_owned(),
            max_request_size: 8 * 1024 * 1024,
            supported_charsets: vec![
                "UTF-8".to_owned(),
                "US-ASCII".to_owned(),
                "ISO-8859-1".to_owned(),
            ],
            default_charset: "UTF-8".to_owned(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a TOML file, then applies the [`BIND_ENV`] override.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load), reading overrides through `env` instead of
    /// the process environment.
    pub fn load_with_env<F>(path: impl AsRef<Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&content)?;
        if let Some(bind) = env(BIND_ENV).filter(|bind| !bind.trim().is_empty()) {
            settings.bind = bind;
        }
        Ok(settings)
    }

    /// Rejects settings the framework cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_size == 0 {
            return Err(ConfigError::Invalid(
                "max_request_size must be greater than zero".to_owned(),
            ));
        }
        if self.supported_charsets.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_charsets must list at least one charset".to_owned(),
            ));
        }
        if !self.supports_charset(&self.default_charset) {
            return Err(ConfigError::Invalid(format!(
                "default_charset {:?} is not in supported_charsets",
                self.default_charset
            )));
        }
        Ok(())
    }

    /// Returns `true` if `charset` is one of the supported charsets (case-insensitive).
    pub fn supports_charset(&self, charset: &str) -> bool {
        self.supported_charsets
            .iter()
            .any(|c| c.eq_ignore_ascii_case(charset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"
            supported_charsets = ["utf-8", "windows-1250"]
            default_charset = "utf-8"
            "#,
        )
        .unwrap();
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.max_request_size, 8 * 1024 * 1024);
        assert!(settings.supports_charset("WINDOWS-1250"));
        assert!(!settings.supports_charset("koi8-r"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Settings::from_toml_str("max_request_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("supported_charsets = []"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml_str(r#"default_charset = "ebcdic""#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("unknown_key = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    fn write_settings(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("haven-{}-{name}.toml", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn bind_override_replaces_file_value() {
        let path = write_settings("override", r#"bind = "127.0.0.1:7000""#);

        let settings = Settings::load_with_env(&path, |key| {
            (key == BIND_ENV).then(|| "0.0.0.0:9999".to_owned())
        })
        .unwrap();
        assert_eq!(settings.bind, "0.0.0.0:9999");

        let untouched = Settings::load_with_env(&path, |_| None).unwrap();
        assert_eq!(untouched.bind, "127.0.0.1:7000");

        let blank = Settings::load_with_env(&path, |_| Some("  ".to_owned())).unwrap();
        assert_eq!(blank.bind, "127.0.0.1:7000");

        fs::remove_file(path).unwrap();
    }

    // The only test that touches the real variable.
    #[test]
    fn load_reads_bind_from_the_environment() {
        let path = write_settings("env", "");
        // SAFETY: no other test in this crate reads or writes HAVEN_BIND.
        unsafe { std::env::set_var(BIND_ENV, "127.0.0.1:6553") };
        let loaded = Settings::load(&path);
        unsafe { std::env::remove_var(BIND_ENV) };

        assert_eq!(loaded.unwrap().bind, "127.0.0.1:6553");
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            Settings::load("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
