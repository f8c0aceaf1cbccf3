use log::debug;
use std::env;
use std::path::{Path, PathBuf};

use crate::models::source::Source;
use crate::utils::error::Error;

pub const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Process configuration, read from the environment.
#[derive(Debug, PartialEq, Clone)]
pub struct Config {
    pub nomad_addr: String,
    pub nomad_token: Option<String>,
    pub nomad_region: Option<String>,
    pub sources_path: Option<PathBuf>,
    pub event_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let event_buffer = match var("NOMAD_OPS_EVENT_BUFFER") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(buffer) if buffer > 0 => buffer,
                _ => {
                    return Err(Error::ConfigurationError(format!(
                        "NOMAD_OPS_EVENT_BUFFER must be a positive integer, got '{}'",
                        value
                    )))
                }
            },
            None => DEFAULT_EVENT_BUFFER,
        };

        let config = Config {
            nomad_addr: var("NOMAD_ADDR").unwrap_or_else(|| DEFAULT_NOMAD_ADDR.to_string()),
            nomad_token: var("NOMAD_TOKEN"),
            nomad_region: var("NOMAD_REGION"),
            sources_path: var("NOMAD_OPS_SOURCES").map(PathBuf::from),
            event_buffer,
        };
        debug!("config: addr={} sources={:?}", config.nomad_addr, config.sources_path);

        Ok(config)
    }

    /// Loads the configured sources, none if no sources file is set.
    pub fn load_sources(&self) -> Result<Vec<Source>, Error> {
        match &self.sources_path {
            Some(path) => load_sources(path),
            None => Ok(Vec::new()),
        }
    }
}

pub fn load_sources(path: &Path) -> Result<Vec<Source>, Error> {
    let contents = std::fs::read_to_string(path)?;
    let sources: Vec<Source> = serde_json::from_str(&contents).map_err(|err| {
        Error::ConfigurationError(format!("invalid sources file {:?}: {}", path, err))
    })?;

    for source in sources.iter() {
        if source.id.is_empty() {
            return Err(Error::ConfigurationError(format!(
                "source with url '{}' has no id",
                source.url
            )));
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.nomad_addr, DEFAULT_NOMAD_ADDR);
        assert_eq!(config.nomad_token, None);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert_eq!(config.load_sources().unwrap().len(), 0);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("NOMAD_ADDR", "https://nomad.internal:4646"),
            ("NOMAD_TOKEN", "secret"),
            ("NOMAD_REGION", ""),
            ("NOMAD_OPS_EVENT_BUFFER", "8"),
        ]))
        .unwrap();

        assert_eq!(config.nomad_addr, "https://nomad.internal:4646");
        assert_eq!(config.nomad_token, Some("secret".to_string()));
        assert_eq!(config.nomad_region, None);
        assert_eq!(config.event_buffer, 8);
    }

    #[test]
    fn rejects_bad_buffer() {
        let result = Config::from_lookup(lookup(&[("NOMAD_OPS_EVENT_BUFFER", "zero")]));

        match result {
            Err(Error::ConfigurationError(_)) => {}
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn missing_sources_file_is_io_error() {
        let result = load_sources(Path::new("/nonexistent/nomad-ops/sources.json"));

        match result {
            Err(Error::IoError { .. }) => {}
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
