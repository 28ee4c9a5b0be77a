use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracepipe_kafka::{Encoding, KafkaConsumerConfig};
use tracepipe_log::{LogConfig, LogLevel};

use crate::OverridableConfig;

/// The name of the configuration file within the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.yml";

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Defines the source of a config error
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var).
    FieldOverride(String),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    origin: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<BoxedError>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            origin: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<BoxedError>,
    {
        Self {
            inner: Some(inner.into()),
            ..Self::new(kind)
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, p: P) -> Self {
        self.origin = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.origin = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            ConfigErrorSource::None => fmt::Display::fmt(&self.kind, f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_deref().map(|error| error as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct ConfigValues {
    kafka: KafkaConsumerConfig,
    logging: LogConfig,
}

impl ConfigValues {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let f = fs::File::open(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.kafka
            .validate()
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::InvalidValue))
    }
}

/// Config struct.
#[derive(Clone, Debug, Default)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl Config {
    /// Loads a config from a given config folder.
    ///
    /// The folder must contain a `config.yml` file. Missing sections and fields take their
    /// default values.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let file = path.join(CONFIG_FILE_NAME);
        let values = ConfigValues::load(&file)?;
        values.validate().map_err(|e| e.file(&file))?;

        Ok(Config { values, path })
    }

    /// Creates a config from a YAML document.
    ///
    /// This is mostly useful for tests.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, ConfigError> {
        let values: ConfigValues = serde_yaml::from_str(yaml)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadYaml))?;
        values.validate()?;

        Ok(Config {
            values,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let kafka = &mut self.values.kafka;

        if let Some(brokers) = overrides.brokers {
            kafka.brokers = brokers
                .split(',')
                .map(str::trim)
                .filter(|broker| !broker.is_empty())
                .map(str::to_owned)
                .collect();

            if kafka.brokers.is_empty() {
                return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("brokers"));
            }
        }

        if let Some(topic) = overrides.topic {
            kafka.topic = topic;
        }

        if let Some(group_id) = overrides.group_id {
            kafka.group_id = group_id;
        }

        if let Some(encoding) = overrides.encoding {
            kafka.encoding = encoding
                .parse::<Encoding>()
                .map_err(|err| ConfigError::for_field(err, "encoding"))?;
        }

        if let Some(level) = overrides.log_level {
            self.values.logging.level = level
                .parse::<LogLevel>()
                .map_err(|err| ConfigError::for_field(err, "log_level"))?;
        }

        self.values.validate()?;
        Ok(self)
    }

    /// Returns the folder the config was loaded from.
    ///
    /// Empty for configs that were not loaded from disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration of the Kafka consumer.
    pub fn kafka(&self) -> &KafkaConsumerConfig {
        &self.values.kafka
    }

    /// Returns the encoding of consumed messages.
    pub fn encoding(&self) -> Encoding {
        self.values.kafka.encoding
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Initializes the global logger from the logging section.
    ///
    /// Must be called once, before any spans are consumed.
    pub fn init_logging(&self) {
        tracepipe_log::init(&self.values.logging);
    }

    /// Serializes the effective configuration to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadYaml))
    }
}
