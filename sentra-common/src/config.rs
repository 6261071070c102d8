//! Configuration loading and data directory resolution
//!
//! Priority order for the config file path:
//! 1. Command-line argument (highest priority)
//! 2. `SENTRA_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/sentra/config.toml` on Linux)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Detection filter thresholds
///
/// Detections failing any of these gates are discarded as noise, not
/// stored. Defaults follow the reference behavior: confidence 0.8,
/// 20 px minimum box edge, aspect ratio 0.15–5.0, five evidence
/// images per report.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub min_box_size: u32,
    pub aspect_ratio_min: f32,
    pub aspect_ratio_max: f32,
    pub evidence_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            min_box_size: 20,
            aspect_ratio_min: 0.15,
            aspect_ratio_max: 5.0,
            evidence_capacity: 5,
        }
    }
}

/// External collaborator endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Camera snapshot endpoint (the monitor's source column wins
    /// when both are set)
    pub camera_url: Option<String>,
    /// Inference sidecar implementing `detect(frame)`
    pub classifier_url: Option<String>,
    /// Evidence blob store base URL
    pub evidence_store_url: Option<String>,
    /// Push notification gateway base URL
    pub push_gateway_url: Option<String>,
}

/// Top-level Sentra configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentraConfig {
    /// SQLite database path; defaults under the platform data dir
    pub database_path: Option<PathBuf>,
    /// Per-topic event buffer capacity
    pub bus_capacity: usize,
    /// Topic carrying alert events
    pub topic: String,
    /// Consumer group name for the notification dispatcher
    pub group_id: String,
    /// Radius for the responder search, kilometres
    pub responder_radius_km: f64,
    /// Delay between frame grabs, milliseconds
    pub frame_interval_ms: u64,
    pub detection: DetectionConfig,
    pub endpoints: EndpointsConfig,
}

impl Default for SentraConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bus_capacity: 100,
            topic: crate::events::ALERT_TOPIC.to_string(),
            group_id: "alert-dispatch".to_string(),
            responder_radius_km: 20.0,
            frame_interval_ms: 250,
            detection: DetectionConfig::default(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl SentraConfig {
    /// Load configuration, resolving the file per the priority order
    ///
    /// A missing file at the default location falls back to compiled
    /// defaults; an explicitly named file that does not exist or does
    /// not parse is an error.
    pub fn load(cli_path: Option<&std::path::Path>) -> Result<Self> {
        // Priority 1: command-line argument
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var("SENTRA_CONFIG") {
            return Self::from_file(std::path::Path::new(&path));
        }

        // Priority 3: platform config dir
        if let Some(path) = dirs::config_dir().map(|d| d.join("sentra").join("config.toml")) {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // Priority 4: compiled defaults
        Ok(Self::default())
    }

    fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Resolve the database path, defaulting under the platform data dir
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("sentra"))
                .unwrap_or_else(|| PathBuf::from("./sentra_data"))
                .join("sentra.db")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let config = SentraConfig::default();
        assert_eq!(config.detection.confidence_threshold, 0.8);
        assert_eq!(config.detection.evidence_capacity, 5);
        assert_eq!(config.responder_radius_km, 20.0);
        assert_eq!(config.topic, "threat-alerts");
    }

    #[test]
    fn test_load_from_file_with_partial_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            responder_radius_km = 5.0

            [detection]
            confidence_threshold = 0.7

            [endpoints]
            push_gateway_url = "http://localhost:9900"
            "#,
        )
        .unwrap();

        let config = SentraConfig::load(Some(&path)).unwrap();
        assert_eq!(config.responder_radius_km, 5.0);
        assert_eq!(config.detection.confidence_threshold, 0.7);
        // Unset keys keep their defaults
        assert_eq!(config.detection.evidence_capacity, 5);
        assert_eq!(
            config.endpoints.push_gateway_url.as_deref(),
            Some("http://localhost:9900")
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = SentraConfig::load(Some(std::path::Path::new("/nonexistent/sentra.toml")));
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
