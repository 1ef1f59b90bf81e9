//! Per-invocation study settings.
//!
//! A [`StudyConfig`] is built for every call, from defaults, a TOML file, or
//! command-line flags. Nothing is shared between invocations.

use crate::learn::{Kernel, Preprocessing};
use crate::protocol::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Study {
    Hosseinzahde,
    SadiAhmed,
}

impl Study {
    pub fn default_output_file(self) -> &'static str {
        match self {
            Study::Hosseinzahde => "hosseinzahde_results.json",
            Study::SadiAhmed => "sadiahmed_results.json",
        }
    }

    /// The kernel each study's classifier is fixed to.
    pub fn kernel(self) -> Kernel {
        match self {
            Study::Hosseinzahde => Kernel::Rbf,
            Study::SadiAhmed => Kernel::Linear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    pub preprocessing: Preprocessing,
    /// Tune the SVC regularisation constant by inner cross-validation.
    pub grid: bool,
    pub random_seed: u64,
    pub n_splits: usize,
    /// Destination of the results bundle; `None` uses the study's default file name.
    pub output_file: Option<PathBuf>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            preprocessing: Preprocessing::Standardize,
            grid: true,
            random_seed: 42,
            n_splits: 10,
            output_file: None,
        }
    }
}

impl StudyConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn output_path(&self, study: Study) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(study.default_output_file()))
    }

    pub fn protocol(&self, study: Study) -> ProtocolConfig {
        ProtocolConfig {
            kernel: study.kernel(),
            preprocessing: self.preprocessing,
            grid: self.grid,
            random_seed: self.random_seed,
            n_splits: self.n_splits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: StudyConfig = toml::from_str("grid = false\nrandom_seed = 7").unwrap();
        assert!(!config.grid);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.n_splits, 10);
        assert_eq!(config.preprocessing, Preprocessing::Standardize);
    }

    #[test]
    fn preprocessing_is_read_in_snake_case() {
        let config: StudyConfig = toml::from_str("preprocessing = \"identity\"").unwrap();
        assert_eq!(config.preprocessing, Preprocessing::Identity);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<StudyConfig>("folds = 3").is_err());
    }

    #[test]
    fn output_path_falls_back_to_study_default() {
        let config = StudyConfig::default();
        assert_eq!(
            config.output_path(Study::SadiAhmed),
            PathBuf::from("sadiahmed_results.json")
        );
        let custom = StudyConfig {
            output_file: Some(PathBuf::from("out/custom.json")),
            ..StudyConfig::default()
        };
        assert_eq!(
            custom.output_path(Study::Hosseinzahde),
            PathBuf::from("out/custom.json")
        );
    }

    #[test]
    fn studies_use_their_published_kernels() {
        let config = StudyConfig::default();
        assert_eq!(config.protocol(Study::Hosseinzahde).kernel, Kernel::Rbf);
        assert_eq!(config.protocol(Study::SadiAhmed).kernel, Kernel::Linear);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "n_splits = 5\noutput_file = \"r.json\"").unwrap();
        let config = StudyConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.n_splits, 5);
        assert_eq!(config.output_file, Some(PathBuf::from("r.json")));
    }
}
