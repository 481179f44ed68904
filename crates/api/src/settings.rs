//! Service settings from `TIMETABLE__SECTION__KEY` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};

const PREFIX: &str = "TIMETABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub body_limit_bytes: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub log_format: LogFormat,
    pub http: HttpSettings,
    /// How long finished jobs stay pollable.
    pub job_retention: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".into(),
                port: 8080,
            },
            log_format: LogFormat::Json,
            http: HttpSettings {
                body_limit_bytes: 2 * 1024 * 1024,
                timeout: Duration::from_secs(30),
            },
            job_retention: jobs::DEFAULT_RETENTION,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads each setting through `lookup`; unset keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |section: &str, key: &str| {
            let name = format!("{PREFIX}__{section}__{key}");
            lookup(&name).map(|v| (name, v))
        };
        let mut s = Self::default();

        if let Some((_, host)) = get("SERVER", "HOST") {
            s.server.host = host;
        }
        if let Some((name, port)) = get("SERVER", "PORT") {
            s.server.port = port.parse().with_context(|| format!("{name}={port}"))?;
        }
        if let Some((name, format)) = get("LOG", "FORMAT") {
            s.log_format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => bail!("{name}: expected json or pretty, got {other}"),
            };
        }
        if let Some((name, limit)) = get("HTTP", "BODY_LIMIT_BYTES") {
            s.http.body_limit_bytes = limit.parse().with_context(|| format!("{name}={limit}"))?;
        }
        if let Some((name, secs)) = get("HTTP", "TIMEOUT_SECS") {
            let secs: u64 = secs.parse().with_context(|| format!("{name}={secs}"))?;
            s.http.timeout = Duration::from_secs(secs);
        }
        if let Some((name, secs)) = get("JOBS", "RETENTION_SECS") {
            let secs: u64 = secs.parse().with_context(|| format!("{name}={secs}"))?;
            s.job_retention = Duration::from_secs(secs);
        }
        Ok(s)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.server.host, self.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let s = from(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn reads_every_section() {
        let s = from(&[
            ("TIMETABLE__SERVER__HOST", "127.0.0.1"),
            ("TIMETABLE__SERVER__PORT", "9000"),
            ("TIMETABLE__LOG__FORMAT", "Pretty"),
            ("TIMETABLE__HTTP__BODY_LIMIT_BYTES", "1024"),
            ("TIMETABLE__HTTP__TIMEOUT_SECS", "5"),
            ("TIMETABLE__JOBS__RETENTION_SECS", "600"),
        ])
        .unwrap();
        assert_eq!(s.listen_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert_eq!(s.http.body_limit_bytes, 1024);
        assert_eq!(s.http.timeout, Duration::from_secs(5));
        assert_eq!(s.job_retention, Duration::from_secs(600));
    }

    #[test]
    fn rejects_garbage() {
        let err = from(&[("TIMETABLE__SERVER__PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("TIMETABLE__SERVER__PORT"));
        assert!(from(&[("TIMETABLE__LOG__FORMAT", "xml")]).is_err());
    }
}
