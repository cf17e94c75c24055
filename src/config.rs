use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::{DetectionThresholds, PipelineConfig, SourceInput};
use crate::schema::{SourceKind, SourceSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_enrolment_source")]
    pub enrolment: SourceConfig,
    #[serde(default = "default_demographic_source")]
    pub demographic: SourceConfig,
    #[serde(default = "default_biometric_source")]
    pub biometric: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub dir: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_high_percentile")]
    pub high_percentile: f64,
    #[serde(default = "default_low_percentile")]
    pub low_percentile: f64,
    #[serde(default = "default_spike_z_score")]
    pub spike_z_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_true")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub output_dir: Option<String>,
    pub high_percentile: Option<f64>,
    pub low_percentile: Option<f64>,
    pub spike_z_score: Option<f64>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/pincode-anomaly/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.paths.data_dir = data_dir;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.paths.output_dir = output_dir;
        }
        if let Some(high) = overrides.high_percentile {
            self.thresholds.high_percentile = high;
        }
        if let Some(low) = overrides.low_percentile {
            self.thresholds.low_percentile = low;
        }
        if let Some(z) = overrides.spike_z_score {
            self.thresholds.spike_z_score = z;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, q) in [
            ("high_percentile", self.thresholds.high_percentile),
            ("low_percentile", self.thresholds.low_percentile),
        ] {
            if !(0.0..=1.0).contains(&q) {
                bail!("thresholds.{name} must be within 0..=1, got {q}");
            }
        }
        if !self.thresholds.spike_z_score.is_finite() || self.thresholds.spike_z_score <= 0.0 {
            bail!(
                "thresholds.spike_z_score must be positive, got {}",
                self.thresholds.spike_z_score
            );
        }
        Ok(())
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.data_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.output_dir)
    }

    /// Source directory, resolved against `data_dir` unless absolute.
    pub fn source_dir(&self, kind: SourceKind) -> PathBuf {
        let dir = expand_tilde(&self.sources.get(kind).dir);
        if dir.is_absolute() {
            dir
        } else {
            self.data_dir().join(dir)
        }
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let input = |kind: SourceKind| SourceInput {
            dir: self.source_dir(kind),
            pattern: self.sources.get(kind).pattern.clone(),
        };
        PipelineConfig {
            sources: SourceSet::new(
                input(SourceKind::Enrolment),
                input(SourceKind::Demographic),
                input(SourceKind::Biometric),
            ),
            thresholds: DetectionThresholds {
                high_percentile: self.thresholds.high_percentile,
                low_percentile: self.thresholds.low_percentile,
                spike_z_score: self.thresholds.spike_z_score,
            },
            parallel: self.loader.parallel,
        }
    }

    pub fn default_template() -> String {
        let template = r#"# pincode-anomaly configuration

[paths]
# Source directories below are resolved against this unless absolute.
data_dir = "."
output_dir = "cleaned_data"

[sources.enrolment]
dir = "api_data_aadhar_enrolment/api_data_aadhar_enrolment"
pattern = "*.csv"

[sources.demographic]
dir = "api_data_aadhar_demographic/api_data_aadhar_demographic"
pattern = "*.csv"

[sources.biometric]
dir = "api_data_aadhar_biometric/api_data_aadhar_biometric"
pattern = "*.csv"

[thresholds]
# Patterns 1 and 2: primary >= high percentile, secondary <= low percentile.
high_percentile = 0.75
low_percentile = 0.25
# Pattern 3: |z| above this in all three sources on the same date.
spike_z_score = 2.0

[loader]
parallel = true
"#;
        template.to_string()
    }
}

impl SourcesConfig {
    pub fn get(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Enrolment => &self.enrolment,
            SourceKind::Demographic => &self.demographic,
            SourceKind::Biometric => &self.biometric,
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enrolment: default_enrolment_source(),
            demographic: default_demographic_source(),
            biometric: default_biometric_source(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            high_percentile: default_high_percentile(),
            low_percentile: default_low_percentile(),
            spike_z_score: default_spike_z_score(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            parallel: default_true(),
        }
    }
}

fn default_data_dir() -> String {
    ".".to_string()
}

fn default_output_dir() -> String {
    "cleaned_data".to_string()
}

fn default_source(kind: SourceKind) -> SourceConfig {
    let slug = kind.as_slug();
    SourceConfig {
        dir: format!("api_data_aadhar_{slug}/api_data_aadhar_{slug}"),
        pattern: default_pattern(),
    }
}

fn default_enrolment_source() -> SourceConfig {
    default_source(SourceKind::Enrolment)
}

fn default_demographic_source() -> SourceConfig {
    default_source(SourceKind::Demographic)
}

fn default_biometric_source() -> SourceConfig {
    default_source(SourceKind::Biometric)
}

fn default_pattern() -> String {
    "*.csv".to_string()
}

fn default_high_percentile() -> f64 {
    crate::detect::DEFAULT_HIGH_PERCENTILE
}

fn default_low_percentile() -> f64 {
    crate::detect::DEFAULT_LOW_PERCENTILE
}

fn default_spike_z_score() -> f64 {
    crate::detect::spikes::DEFAULT_SPIKE_Z_SCORE
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{Config, ConfigOverrides};
    use crate::schema::SourceKind;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template");
        let defaults = Config::default();
        assert_eq!(parsed.paths.output_dir, defaults.paths.output_dir);
        assert_eq!(
            parsed.sources.biometric.dir,
            "api_data_aadhar_biometric/api_data_aadhar_biometric"
        );
        assert_eq!(parsed.thresholds.high_percentile, 0.75);
        assert_eq!(parsed.thresholds.low_percentile, 0.25);
        assert_eq!(parsed.thresholds.spike_z_score, 2.0);
        assert!(parsed.loader.parallel);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str(
            "[thresholds]\nspike_z_score = 3.0\n\n[sources.enrolment]\ndir = \"/data/enrol\"\n",
        )
        .expect("partial");
        assert_eq!(parsed.thresholds.spike_z_score, 3.0);
        assert_eq!(parsed.thresholds.high_percentile, 0.75);
        assert_eq!(parsed.sources.enrolment.pattern, "*.csv");
        assert_eq!(
            parsed.source_dir(SourceKind::Enrolment),
            Path::new("/data/enrol")
        );
    }

    #[test]
    fn overrides_flow_into_pipeline_config() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            data_dir: Some("/srv/aadhar".to_string()),
            high_percentile: Some(0.9),
            spike_z_score: Some(2.5),
            ..ConfigOverrides::default()
        });
        config.validate().expect("valid");
        let pipeline = config.to_pipeline_config();
        assert_eq!(pipeline.thresholds.high_percentile, 0.9);
        assert_eq!(pipeline.thresholds.low_percentile, 0.25);
        assert_eq!(pipeline.thresholds.spike_z_score, 2.5);
        assert_eq!(
            pipeline.sources.demographic.dir,
            Path::new("/srv/aadhar/api_data_aadhar_demographic/api_data_aadhar_demographic")
        );
    }

    #[test]
    fn out_of_range_percentile_is_rejected() {
        let mut config = Config::default();
        config.thresholds.low_percentile = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.paths.data_dir, ".");
    }

    #[test]
    fn written_template_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        Config::write_template(&path).expect("write");
        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.sources.demographic.pattern, "*.csv");
    }
}
