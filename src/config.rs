//! Plugin configuration.
//!
//! Options arrive inline as a `key=value` map from the host's plugin
//! definition; a `config_file` entry pulls in an external TOML file whose
//! three sections are all mandatory. Configuration problems are fatal
//! before any enumeration starts.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::utils::errors::{PluginError, Result};

/// Recognized plugin options with their defaults.
#[derive(Debug, Clone)]
pub struct PluginOptions {
    /// Only these buckets are backed up when set; unset means all buckets.
    pub buckets_include: Option<Vec<String>>,

    /// These buckets are never backed up.
    pub buckets_exclude: Option<Vec<String>>,

    /// Reserved; exactly one enumeration worker runs today.
    pub nb_worker: usize,

    /// Capacity of the job channel between enumerator and consumer.
    pub queue_size: usize,

    /// Reserved.
    pub prefetch_size: u64,

    pub debug: bool,

    // Store credentials
    pub host: String,
    pub port: u16,
    pub provider: String,

    /// Access key (config-file `username`).
    pub key: String,

    /// Secret key (config-file `password`).
    pub secret: String,

    /// TLS toggle (config-file `tls`).
    pub secure: bool,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            buckets_include: None,
            buckets_exclude: None,
            nb_worker: 1,
            queue_size: default_queue_size(),
            prefetch_size: 0,
            debug: false,
            host: String::new(),
            port: 9000,
            provider: String::new(),
            key: String::new(),
            secret: String::new(),
            secure: false,
        }
    }
}

fn default_queue_size() -> usize {
    1000
}

impl PluginOptions {
    /// Build options from the host's inline plugin definition. A
    /// `config_file` entry is applied last, so file values take precedence
    /// over inline ones.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        for (name, value) in map {
            match name.as_str() {
                "buckets_include" => options.buckets_include = Some(split_buckets(value)),
                "buckets_exclude" => options.buckets_exclude = Some(split_buckets(value)),
                "nb_worker" => options.nb_worker = parse_int(name, value)?,
                "queue_size" => options.queue_size = parse_int(name, value)?,
                "prefetch_size" => options.prefetch_size = parse_int(name, value)?,
                "debug" => options.debug = parse_bool(name, value)?,
                "host" => options.host = value.clone(),
                "port" => options.port = parse_int(name, value)?,
                "provider" => options.provider = value.clone(),
                "key" => options.key = value.clone(),
                "secret" => options.secret = value.clone(),
                "tls" | "secure" => options.secure = parse_bool(name, value)?,
                "config_file" => {}
                other => debug!("ignoring unknown plugin option {other}"),
            }
        }

        if let Some(file) = map.get("config_file") {
            options.apply_file(Path::new(file))?;
        }
        Ok(options)
    }

    /// Merge the external config file into these options. All three
    /// sections and every key in them are mandatory.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            PluginError::Config(format!("cannot read config file {}: {err}", path.display()))
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|err| {
            PluginError::Config(format!("invalid config file {}: {err}", path.display()))
        })?;

        self.key = file.credentials.username;
        self.secret = file.credentials.password;
        self.host = file.host.hostname;
        self.port = file.host.port;
        self.provider = file.host.provider;
        self.secure = file.host.tls;
        self.nb_worker = file.misc.nb_worker;
        self.queue_size = file.misc.queue_size;
        self.prefetch_size = file.misc.prefetch_size;
        Ok(())
    }
}

/// External configuration file layout.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    credentials: CredentialsSection,
    host: HostSection,
    misc: MiscSection,
}

#[derive(Debug, Deserialize)]
struct CredentialsSection {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct HostSection {
    hostname: String,
    port: u16,
    provider: String,
    tls: bool,
}

#[derive(Debug, Deserialize)]
struct MiscSection {
    nb_worker: usize,
    queue_size: usize,
    prefetch_size: u64,
}

fn split_buckets(raw: &str) -> Vec<String> {
    raw.split(',').map(|b| b.trim().to_string()).collect()
}

/// Strict boolean parsing: only `true`/`false` in either capitalization.
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(PluginError::Config(format!("{name}: {other} is not a boolean"))),
    }
}

fn parse_int<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| PluginError::Config(format!("{name}: {err}")))
}
