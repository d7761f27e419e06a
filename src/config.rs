use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analyzer::features::FeatureEstimatorKind;
use crate::matcher::MatchMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub assets: AssetsConfig,
    pub analysis: AnalysisConfig,
    pub commentary: CommentaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory of reference celebrity images.
    pub image_dir: PathBuf,
    /// Side table with per-celebrity metadata. Optional; a missing or
    /// unreadable file just means an empty metadata set.
    pub metadata_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub feature_estimator: FeatureEstimatorKind,
    pub match_mode: MatchMode,
    /// Where request-scoped upload files are created. Defaults to the
    /// system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentaryConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub groq_api_key: Option<String>,
    pub groq_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            assets: AssetsConfig {
                image_dir: PathBuf::from("celebrities"),
                metadata_csv: Some(PathBuf::from("celebrities/celebrities.csv")),
            },
            analysis: AnalysisConfig {
                feature_estimator: FeatureEstimatorKind::Pixel,
                match_mode: MatchMode::Random,
                scratch_dir: None,
            },
            commentary: CommentaryConfig {
                openai_api_key: None,
                openai_base_url: None,
                groq_api_key: None,
                groq_base_url: None,
                request_timeout_secs: 12,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server.port = port.parse()?;
        }

        if let Ok(dir) = std::env::var("CELEBRITY_DIR") {
            config.assets.image_dir = PathBuf::from(&dir);
            config.assets.metadata_csv = Some(PathBuf::from(dir).join("celebrities.csv"));
        }

        if let Ok(csv) = std::env::var("CELEBRITY_CSV") {
            config.assets.metadata_csv = Some(PathBuf::from(csv));
        }

        if let Ok(kind) = std::env::var("FEATURE_ESTIMATOR") {
            config.analysis.feature_estimator = kind.parse()?;
        }

        if let Ok(mode) = std::env::var("MATCH_MODE") {
            config.analysis.match_mode = mode.parse()?;
        }

        if let Ok(dir) = std::env::var("SCRATCH_DIR") {
            config.analysis.scratch_dir = Some(PathBuf::from(dir));
        }

        config.commentary.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        config.commentary.openai_base_url = std::env::var("OPENAI_BASE_URL").ok();
        config.commentary.groq_api_key = std::env::var("GROQ_API_KEY").ok();
        config.commentary.groq_base_url = std::env::var("GROQ_BASE_URL").ok();

        if let Ok(timeout) = std::env::var("COMMENTARY_TIMEOUT_SECS") {
            config.commentary.request_timeout_secs = timeout.parse()?;
        }

        Ok(config)
    }
}
