use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::palette;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    #[default]
    Icon,
    Circle,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MapOptions {
    pub zoom: u8,
    pub origin_label: String,
    pub marker_style: MarkerStyle,
    pub tile_url: String,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            zoom: palette::DEFAULT_ZOOM,
            origin_label: palette::ORIGIN_LABEL.to_string(),
            marker_style: MarkerStyle::default(),
            tile_url: palette::TILE_URL.to_string(),
            max_zoom: palette::MAX_ZOOM,
            attribution: palette::ATTRIBUTION.to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub listen_addr: Option<String>,
    pub thread_count: Option<usize>,
    pub template_dir: Option<String>,
    pub overlay_url: Option<String>,
    pub overlay_timeout_secs: Option<u64>,
    pub overlay_refresh_secs: Option<u64>,
    #[serde(default)]
    pub map: MapOptions,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = if Path::new("walkmap.toml").exists() {
            "walkmap.toml"
        } else if Path::new("walkmap.example.toml").exists() {
            "walkmap.example.toml"
        } else {
            return Err(anyhow::anyhow!("Configuration file not found. Please create walkmap.toml or provide walkmap.example.toml."));
        };
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if let Some(overlay) = &config.overlay_url {
            url::Url::parse(overlay).map_err(|e| anyhow::anyhow!("invalid overlay_url '{}': {}", overlay, e))?;
        }
        if config.map.zoom > config.map.max_zoom {
            return Err(anyhow::anyhow!("map.zoom {} exceeds map.max_zoom {}", config.map.zoom, config.map.max_zoom));
        }
        Ok(config)
    }
}
