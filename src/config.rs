use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = ".config/invoice_desk.toml";
pub const BASE_URL_ENV: &str = "INVOICE_API_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub branding: Branding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// Rasterize the invoice sheet and slice the bitmap across pages.
    #[default]
    Snapshot,
    /// Draw text and the item table straight onto a single page.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
}

impl PageFormat {
    /// Page size in PDF points (width, height).
    pub fn size_pt(self) -> (f32, f32) {
        match self {
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::Letter => (612.0, 792.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub strategy: ExportStrategy,
    #[serde(default)]
    pub page_format: PageFormat,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub bold_font_path: Option<PathBuf>,
}

fn default_pixel_ratio() -> f32 {
    2.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            strategy: ExportStrategy::default(),
            page_format: PageFormat::default(),
            pixel_ratio: default_pixel_ratio(),
            output_dir: default_output_dir(),
            font_path: None,
            bold_font_path: None,
        }
    }
}

/// Fixed text printed on the rendered sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct Branding {
    #[serde(default = "default_logo_text")]
    pub logo_text: String,
    #[serde(default = "default_payment_lines")]
    pub payment_lines: Vec<String>,
}

fn default_logo_text() -> String {
    "JS".to_string()
}

fn default_payment_lines() -> Vec<String> {
    vec![
        "Bank: Fauget Bank".to_string(),
        "Account Name: Juliana Silva".to_string(),
        "Account No: 123-456-7890".to_string(),
    ]
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            logo_text: default_logo_text(),
            payment_lines: default_payment_lines(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file if it exists, otherwise fall back to defaults. Environment
    /// overrides are applied in both cases.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let mut cfg = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            Self::load(path)?
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.api.timeout_secs, 15);
        assert_eq!(cfg.export.strategy, ExportStrategy::Snapshot);
        assert_eq!(cfg.export.page_format, PageFormat::A4);
        assert_eq!(cfg.export.pixel_ratio, 2.0);
        assert_eq!(cfg.branding.logo_text, "JS");
    }

    #[test]
    fn test_parse_full_file() {
        let cfg: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://billing.example.com/api"
            timeout_secs = 5

            [export]
            strategy = "direct"
            page_format = "letter"
            output_dir = "out"

            [branding]
            logo_text = "AC"
            payment_lines = ["Bank: Example"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://billing.example.com/api");
        assert_eq!(cfg.export.strategy, ExportStrategy::Direct);
        assert_eq!(cfg.export.page_format.size_pt(), (612.0, 792.0));
        assert_eq!(cfg.export.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.branding.payment_lines, vec!["Bank: Example"]);
    }

    #[test]
    fn test_env_overrides_base_url() {
        let mut cfg = Config::default();
        cfg.apply_env(|key| (key == BASE_URL_ENV).then(|| "http://10.0.0.2/api".to_string()));
        assert_eq!(cfg.api.base_url, "http://10.0.0.2/api");

        cfg.apply_env(|_| Some("  ".to_string()));
        assert_eq!(cfg.api.base_url, "http://10.0.0.2/api");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.export.output_dir, PathBuf::from("."));
    }
}
