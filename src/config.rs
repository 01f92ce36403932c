// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Configuration File Loading
//!
//! Reads a YAML configuration file found by name in a list of search paths and
//! exposes it either as dotted-key lookups ([`Settings`]) or as the typed
//! [`AppConfig`].
//!
//! ```yaml
//! app: demo
//! debug: true
//! db:
//!   connection: mysql
//!   username: root
//!   password: secret
//!   database: demo
//! ```

use crate::errors::ConfigError;
use serde::{de::DeserializeOwned, Deserialize};
use serde_yaml::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Locates and reads `<name>.yaml` (or `<name>.yml`) from the search paths, in order.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    name: String,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        ConfigLoader::new("config")
    }
}

impl ConfigLoader {
    /// Looks for `name` in the current directory only.
    pub fn new(name: &str) -> ConfigLoader {
        ConfigLoader {
            name: name.to_owned(),
            search_paths: vec![PathBuf::from(".")],
        }
    }

    /// Replaces the default search path with `path`, then accumulates further paths.
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        if self.search_paths == [PathBuf::from(".")] {
            self.search_paths.clear();
        }
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// First existing config file in the search paths.
    pub fn find(&self) -> Result<PathBuf, ConfigError> {
        for dir in &self.search_paths {
            for ext in YAML_EXTENSIONS {
                let candidate = dir.join(format!("{}.{}", self.name, ext));
                if candidate.is_file() {
                    debug!("found config file: {}", candidate.display());
                    return Ok(candidate);
                }
            }
        }

        Err(ConfigError::NotFound {
            name: self.name.clone(),
            paths: self
                .search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let path = self.find()?;
        let content = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e.to_string()))?;

        Settings::from_yaml(&content)
    }
}

/// A loaded configuration tree.
///
/// Lookups take dotted keys (`db.username`) and return the zero value of the
/// requested type when the key is missing or holds another type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    root: Value,
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Settings, ConfigError> {
        let root: Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Settings { root })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |node, part| node.get(part))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Scalars are rendered as strings; anything else yields an empty string.
    pub fn get_string(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1"),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    /// Deserializes the whole tree into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_yaml::from_value(self.root.clone())
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Typed view of the application configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: String,
    pub debug: bool,
    pub db: DbConfig,
    pub rabbitmq: RabbitMQConfig,
}

impl AppConfig {
    pub fn load(loader: &ConfigLoader) -> Result<AppConfig, ConfigError> {
        loader.load()?.deserialize()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub connection: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

/// Broker coordinates; defaults to the local broker with the guest account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl Default for RabbitMQConfig {
    fn default() -> Self {
        RabbitMQConfig {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: String::new(),
        }
    }
}

impl RabbitMQConfig {
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }
}
