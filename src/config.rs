//! Linker configuration parsing.
//!
//! ```toml
//! [platform]
//! arch = "ppc64le"
//! os = "linux"
//!
//! [lookup]
//! library_dir = "/opt/runtime/lib"
//! helper_library = "syslookup"
//!
//! [linker]
//! cache_sequences = true
//! ```
//!
//! Every section and key is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::abi::{Arch, Os, Platform};

/// Configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub platform: PlatformConfig,
    pub lookup: LookupConfig,
    pub linker: LinkerConfig,
}

/// Target overrides. Missing fields fall back to the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub arch: Option<Arch>,
    pub os: Option<Os>,
}

/// Where the system lookup finds its libraries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Directory holding the helper library. Defaults to `lib` (`bin` on
    /// Windows) next to the running executable.
    pub library_dir: Option<PathBuf>,
    /// Base name of the helper library, without prefix or extension.
    pub helper_library: String,
    /// Windows installation directory. Defaults to `%SystemRoot%`.
    pub system_root: Option<PathBuf>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            helper_library: "syslookup".to_string(),
            system_root: None,
        }
    }
}

impl LookupConfig {
    pub fn system_root(&self) -> Option<PathBuf> {
        self.system_root
            .clone()
            .or_else(|| std::env::var_os("SystemRoot").map(PathBuf::from))
    }

    /// The helper library directory for `os`.
    pub fn library_dir(&self, os: Os) -> PathBuf {
        if let Some(dir) = &self.library_dir {
            return dir.clone();
        }
        let sub = if os == Os::Windows { "bin" } else { "lib" };
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_default()
            .join(sub)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Reuse calling sequences for repeated signatures.
    pub cache_sequences: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self { cache_sequences: true }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// The configured platform, with the host filling in missing fields.
    pub fn platform(&self) -> Result<Platform, ConfigError> {
        let arch = self.platform.arch.or_else(Arch::host);
        let os = self.platform.os.or_else(Os::host);
        match (arch, os) {
            (Some(arch), Some(os)) => Ok(Platform::new(arch, os)),
            _ => Err(ConfigError::UnknownHost),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(String, std::io::Error),
    /// TOML parse error.
    Parse(toml::de::Error),
    /// No override given and the host is not a known platform.
    UnknownHost,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Failed to read config file '{}': {}", path, e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::UnknownHost => write!(f, "Host platform is not supported; set [platform] arch and os"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[platform]
arch = "ppc64"
os = "aix"

[lookup]
library_dir = "/opt/runtime/lib"

[linker]
cache_sequences = false
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.platform().unwrap(), Platform::new(Arch::Ppc64, Os::Aix));
        assert_eq!(config.lookup.library_dir(Os::Aix), PathBuf::from("/opt/runtime/lib"));
        assert_eq!(config.lookup.helper_library, "syslookup");
        assert!(!config.linker.cache_sequences);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(config.linker.cache_sequences);
        assert!(config.platform.arch.is_none());
        assert!(config.lookup.library_dir(Os::Windows).ends_with("bin"));
    }

    #[test]
    fn test_unknown_arch_is_rejected() {
        let err = Config::from_str("[platform]\narch = \"vax\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse config"));
    }
}
