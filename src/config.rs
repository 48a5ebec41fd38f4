use failure::Fail;
use log::LevelFilter;
use std::{collections::HashMap, fs, path::PathBuf};
use toml;

/// Load configuration from a TOML file.
pub fn load(path: &str) -> crate::Result<Config> {
    let data = fs::read(path).map_err(ReadConfigurationError)?;
    let config: Config = toml::from_slice(&data)
        .map_err(ConfigurationError)?;
    config.validate()?;
    Ok(config)
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub submission: Submission,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    /// Validate configuration correctness.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if self.submission.file_types.is_empty() {
            bail!("At least one allowed file type must be configured");
        }

        for ext in &self.submission.file_types {
            if ext.starts_with('.') {
                bail!("File types are configured without a leading dot \
                    (found {:?})", ext);
            }
        }

        Ok(())
    }
}

/// Filesystem layout.
#[derive(Clone, Debug, Deserialize)]
pub struct Paths {
    /// Transient staging area for uploaded-but-unposted files.
    pub staging: PathBuf,
    /// Permanent repository of posted revisions.
    pub repository: PathBuf,
    /// Cold storage for files of superseded revisions.
    pub archive: PathBuf,
    /// Location of generated bibliographic reference artifacts.
    pub bibxml: PathBuf,
}

/// Submission processing settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Submission {
    /// Allowed file extensions, without leading dots.
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,
    /// Days until a newly posted revision expires.
    #[serde(default = "default_expire_days")]
    pub expire_days: i64,
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Logging {
    /// Default logging level.
    #[serde(default = "default_level_filter")]
    pub level: LevelFilter,
    /// Custom filters.
    #[serde(default)]
    pub filters: HashMap<String, LevelFilter>,
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot read configuration file")]
pub struct ReadConfigurationError(#[fail(cause)] std::io::Error);

#[derive(Debug, Fail)]
#[fail(display = "Invalid configuration: {}", _0)]
pub struct ConfigurationError(#[fail(cause)] toml::de::Error);

fn default_file_types() -> Vec<String> {
    ["xml", "txt", "html", "pdf"].iter().map(|s| s.to_string()).collect()
}

fn default_expire_days() -> i64 {
    185
}

fn default_level_filter() -> LevelFilter {
    LevelFilter::Info
}

impl Default for Submission {
    fn default() -> Self {
        Submission {
            file_types: default_file_types(),
            expire_days: default_expire_days(),
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_level_filter(),
            filters: HashMap::new(),
        }
    }
}
