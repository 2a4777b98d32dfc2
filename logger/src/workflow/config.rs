use crate::generator::world::SyntheticSettings;
use anyhow::Context;
use clap::ValueEnum;
use radarcore::host_interface::ConnectOptions;
use radarcore::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Host-default driving, 120 s after the first detection
    Safe,
    /// Aggressive driving, 240 s after the radar starts
    Unsafe,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub connection: ConnectOptions,
    pub session: SessionConfig,
    pub synthetic: SyntheticSettings,
}

/// Command-line values that take precedence over the loaded config.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub label: Option<String>,
    pub runtime: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl LoggerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading logger config {}", path_ref.display()))?;
        let config: LoggerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing logger config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_profile(profile: Profile) -> Self {
        let session = match profile {
            Profile::Safe => SessionConfig::safe(),
            Profile::Unsafe => SessionConfig::reckless(),
        };
        Self {
            session,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(label) = overrides.label {
            self.session.label = label;
        }
        if let Some(runtime) = overrides.runtime {
            self.session.total_runtime_seconds = runtime;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.session.output_dir = output_dir;
        }
        if let Some(seed) = overrides.seed {
            self.session.seed = Some(seed);
            self.synthetic.seed = seed;
        }
        if let Some(host) = overrides.host {
            self.connection.host = host;
        }
        if let Some(port) = overrides.port {
            self.connection.port = port;
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        self.session.clone()
    }
}
