use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, warn};

use crate::collectors::CollectorRegistry;
use crate::models::Target;
use crate::state::{load, new_swap, store, Swap};

pub const CONFIG_ENV: &str = "IPMI_EXPORTER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";
/// Upper bound for `timeout` and `interval`, seconds
pub const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Background timer refreshes the cache; scrapes read it
    #[default]
    Cadence,
    /// Every scrape runs a full collection before answering
    OnDemand,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConf,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConf {
    pub address: String,
    pub drive: String,
    pub collectors: Vec<String>,
    /// Per-cycle deadline, seconds
    pub timeout: u64,
    /// Cadence interval, seconds
    pub interval: u64,
    pub mode: CollectionMode,
    /// Appended to every FreeIPMI command line, shell-quoted
    pub extra_args: String,
    #[serde(skip)]
    parsed_extra_args: Vec<String>,
}

impl Default for GlobalConf {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:9290".into(),
            drive: "LAN_2_0".into(),
            collectors: vec![
                "ipmimonitoring".into(),
                "ipmi-dcmi".into(),
                "ipmi-chassis".into(),
            ],
            timeout: 30,
            interval: 60,
            mode: CollectionMode::Cadence,
            extra_args: String::new(),
            parsed_extra_args: Vec::new(),
        }
    }
}

impl GlobalConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn extra_args(&self) -> &[String] {
        &self.parsed_extra_args
    }
}

impl Target {
    /// Collector names to run for this target, in order
    pub fn enabled_collectors<'a>(&'a self, global: &'a GlobalConf) -> &'a [String] {
        self.collectors.as_deref().unwrap_or(&global.collectors)
    }
}

impl Config {
    /// Checks the values serde cannot, and resolves derived fields
    pub fn validate(mut self, registry: &CollectorRegistry) -> Result<Self, ConfigError> {
        let g = &mut self.global;
        if g.timeout == 0 {
            return Err(ConfigError::Invalid("global.timeout must be at least 1 second".into()));
        }
        if g.mode == CollectionMode::Cadence && g.interval == 0 {
            return Err(ConfigError::Invalid("global.interval must be at least 1 second".into()));
        }
        for (field, secs) in [("timeout", g.timeout), ("interval", g.interval)] {
            if secs > MAX_PERIOD_SECS {
                return Err(ConfigError::Invalid(format!(
                    "global.{field} must be at most {MAX_PERIOD_SECS} seconds"
                )));
            }
        }
        g.parsed_extra_args = shell_words::split(&g.extra_args)
            .map_err(|e| ConfigError::Invalid(format!("global.extra_args: {e}")))?;

        let unknown = |names: &[String]| names.iter().find(|n| !registry.contains(n)).cloned();
        if let Some(name) = unknown(&self.global.collectors) {
            return Err(ConfigError::Invalid(format!("unknown collector {name:?}")));
        }
        for (i, target) in self.targets.iter().enumerate() {
            if target.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("targets[{i}].host is empty")));
            }
            if let Some(name) = target.collectors.as_deref().and_then(unknown) {
                return Err(ConfigError::Invalid(format!(
                    "unknown collector {name:?} for target {}",
                    target.host
                )));
            }
        }
        Ok(self)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
        .into()
}

pub fn parse_config(text: &str, registry: &CollectorRegistry) -> Result<Config, ConfigError> {
    // an empty file means "all defaults, no targets"
    let config = if text.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(text)?
    };
    config.validate(registry)
}

pub async fn load_config(path: &Path, registry: &CollectorRegistry) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_config(&text, registry)
}

/// The active configuration, swapped atomically on reload
#[derive(Clone)]
pub struct ConfigHandle {
    path: PathBuf,
    registry: Arc<CollectorRegistry>,
    current: Swap<Config>,
}

impl ConfigHandle {
    pub fn new(path: PathBuf, registry: Arc<CollectorRegistry>, initial: Config) -> Self {
        Self {
            path,
            registry,
            current: new_swap(initial),
        }
    }

    /// The version in effect now; unaffected by later reloads
    pub fn current(&self) -> Arc<Config> {
        load(&self.current)
    }

    /// Re-reads the file; on failure the active configuration stays in place
    pub async fn reload(&self) -> Result<Arc<Config>, ConfigError> {
        let fresh = load_config(&self.path, &self.registry).await?;
        let previous = self.current();
        if fresh.global.address != previous.global.address
            || fresh.global.mode != previous.global.mode
        {
            warn!("listen address and collection mode changes take effect after a restart");
        }
        let fresh = store(&self.current, fresh);
        info!(
            path = %self.path.display(),
            targets = fresh.targets.len(),
            "configuration reloaded"
        );
        Ok(fresh)
    }

    /// Reloads on every SIGHUP
    #[cfg(unix)]
    pub fn spawn_reload_on_signal(&self) -> std::io::Result<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let handle = self.clone();
        Ok(tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("SIGHUP received, reloading configuration");
                if let Err(e) = handle.reload().await {
                    error!(error = %e, "configuration reload failed, keeping previous");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
global:
  address: "127.0.0.1:9290"
  drive: "LAN"
  collectors: [ipmimonitoring, ipmi-chassis]
  timeout: 10
  interval: 30
  extra_args: "--session-timeout=5000 -W 'authcap'"
targets:
  - host: 10.0.0.1
    user: admin
    pwd: secret
  - host: 10.0.0.2
    user: root
    pwd: calvin
    collectors: [ipmi-dcmi]
"#;

    fn registry() -> CollectorRegistry {
        CollectorRegistry::with_defaults()
    }

    #[test]
    fn test_parse_sample() {
        let cfg = parse_config(SAMPLE, &registry()).unwrap();
        assert_eq!(cfg.global.address, "127.0.0.1:9290");
        assert_eq!(cfg.global.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.global.mode, CollectionMode::Cadence);
        assert_eq!(cfg.global.extra_args(), ["--session-timeout=5000", "-W", "authcap"]);
        assert_eq!(cfg.targets.len(), 2);
        assert_eq!(
            cfg.targets[0].enabled_collectors(&cfg.global),
            ["ipmimonitoring", "ipmi-chassis"]
        );
        assert_eq!(cfg.targets[1].enabled_collectors(&cfg.global), ["ipmi-dcmi"]);
    }

    #[test]
    fn test_defaults() {
        let cfg = parse_config("", &registry()).unwrap();
        assert!(cfg.targets.is_empty());
        assert_eq!(cfg.global.address, "0.0.0.0:9290");
        assert_eq!(cfg.global.collectors.len(), 3);

        let cfg = parse_config("global:\n  mode: on_demand\n", &registry()).unwrap();
        assert_eq!(cfg.global.mode, CollectionMode::OnDemand);
        assert_eq!(cfg.global.timeout, 30);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "global:\n  collectors: [ipmi-sel]\n",
            "global:\n  timeout: 0\n",
            "global:\n  interval: 0\n",
            "global:\n  timeout: 18446744073709551615\n",
            "global:\n  timeout: 86401\n",
            "global:\n  mode: on_demand\n  interval: 86401\n",
            "global:\n  extra_args: \"'unterminated\"\n",
            "targets:\n  - host: ''\n",
            "targets:\n  - host: a\n    collectors: [bogus]\n",
        ];
        for case in cases {
            let err = parse_config(case, &registry()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{case}: {err}");
        }
        assert!(matches!(
            parse_config("targets: [", &registry()),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_on_demand_ignores_zero_interval() {
        let cfg = parse_config("global:\n  mode: on_demand\n  interval: 0\n", &registry());
        assert!(cfg.is_ok());
    }

    #[test]
    fn test_period_bound_is_inclusive() {
        let yaml = "global:\n  timeout: 86400\n  interval: 86400\n";
        let cfg = parse_config(yaml, &registry()).unwrap();
        assert_eq!(cfg.global.timeout(), Duration::from_secs(MAX_PERIOD_SECS));
        assert_eq!(cfg.global.interval(), Duration::from_secs(MAX_PERIOD_SECS));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/ipmi.yml"), &registry())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn test_reload_swaps_whole_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let registry = Arc::new(registry());
        let initial = load_config(file.path(), &registry).await.unwrap();
        let handle = ConfigHandle::new(file.path().to_path_buf(), registry, initial);

        let before = handle.current();
        assert_eq!(before.targets.len(), 2);

        std::fs::write(file.path(), "targets:\n  - host: 10.0.0.9\n").unwrap();
        let after = handle.reload().await.unwrap();
        assert_eq!(after.targets.len(), 1);
        assert_eq!(handle.current().targets[0].host, "10.0.0.9");
        // a cycle holding the old version keeps seeing it unchanged
        assert_eq!(before.targets.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let registry = Arc::new(registry());
        let initial = load_config(file.path(), &registry).await.unwrap();
        let handle = ConfigHandle::new(file.path().to_path_buf(), registry, initial);

        std::fs::write(file.path(), "global:\n  timeout: 0\n").unwrap();
        assert!(handle.reload().await.is_err());
        assert_eq!(handle.current().targets.len(), 2);
        assert_eq!(handle.current().global.timeout, 10);
    }
}
