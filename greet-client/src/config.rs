use std::{path::Path, time::Duration};

use greet_protocol::Greeting;
use serde::{Deserialize, Serialize};

use crate::client::GreetBuilder;

pub const DEFAULT_URI: &str = "http://localhost:50051";
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error")]
    IO(#[from] std::io::Error),
    #[error("Yaml error")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    #[serde(with = "http_serde::uri")]
    pub uri: http::Uri,
    /// Delay between two requests of a client stream
    #[serde(with = "humantime_serde")]
    pub pacing: Duration,
    pub greetings: Greetings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: http::Uri::from_static(DEFAULT_URI),
            pacing: DEFAULT_PACING,
            greetings: Greetings::default(),
        }
    }
}

impl Config {
    pub fn from_slice(slice: &[u8]) -> Result<Config, Error> {
        Ok(serde_yaml::from_slice(slice)?)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let content = tokio::fs::read(&path).await?;
        Self::from_slice(&content)
    }

    pub fn to_greet_builder(&self) -> GreetBuilder {
        GreetBuilder::new(self.uri.clone())
    }
}

/// Payloads used by each call pattern
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Greetings {
    pub unary: Greeting,
    pub many_times: Greeting,
    pub long_greet: Vec<Greeting>,
    pub everyone: Vec<Greeting>,
}

fn first_names(names: &[&str]) -> Vec<Greeting> {
    names.iter().map(|&n| Greeting::first_name(n)).collect()
}

impl Default for Greetings {
    fn default() -> Self {
        Self {
            unary: Greeting::new("Artha", "Prihardana"),
            many_times: Greeting::new("Artha", "Prihardana"),
            long_greet: first_names(&["Artha", "Jhon", "Antony", "Budi", "Jajang"]),
            everyone: first_names(&["Stephane", "John", "Lucy", "Mark", "Piper"]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_uri_uses_default_port() {
        let config = Config::default();
        assert_eq!(
            config.uri.port_u16(),
            Some(greet_protocol::DEFAULT_PORT)
        );
    }

    #[test]
    fn empty_config() {
        let config = Config::from_slice(b"{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_config() {
        let t = b"
uri: http://greeter.example.com:6000
pacing: 250ms
greetings:
  everyone:
  - first_name: Stephane
  - first_name: John
    last_name: Doe
";
        let config = Config::from_slice(t).unwrap();
        assert_eq!(config.uri.host(), Some("greeter.example.com"));
        assert_eq!(config.uri.port_u16(), Some(6000));
        assert_eq!(config.pacing, Duration::from_millis(250));
        assert_eq!(
            config.greetings.everyone,
            vec![Greeting::first_name("Stephane"), Greeting::new("John", "Doe")]
        );
        // Unspecified payloads keep their defaults
        assert_eq!(
            config.greetings.long_greet,
            Greetings::default().long_greet
        );
        assert_eq!(config.greetings.unary, Greeting::new("Artha", "Prihardana"));
    }

    #[test]
    fn invalid_pacing() {
        let r = Config::from_slice(b"pacing: soon");
        assert!(matches!(r, Err(Error::Yaml(_))));
    }

    #[tokio::test]
    async fn missing_file() {
        let r = Config::from_file("/nonexistent/greet.yaml").await;
        assert!(matches!(r, Err(Error::IO(e)) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
