//! In-memory map instance: a view plus the ordered layers added to it.
//!
//! A `Scene` is what a render pass produces. It is serialized as-is for the
//! JSON endpoint, converted into a MapLibre style by `style`, and replayed onto
//! a Leaflet map by the HTML page template.

use serde::Serialize;
use tracing::warn;

use crate::models::Center;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub url: String,
    pub max_zoom: u8,
    pub attribution: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Icon {
    pub class: String,
    pub color: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: Center,
    pub icon: Option<Icon>,
    pub category: Option<String>,
    pub popup: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PathStyle {
    pub color: String,
    pub fill_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Circle {
    pub center: Center,
    pub radius_m: f64,
    pub style: PathStyle,
    pub popup: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CircleMarker {
    pub position: Center,
    pub radius_px: f64,
    pub style: PathStyle,
    pub category: Option<String>,
    pub popup: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Tile(TileLayer),
    Marker(Marker),
    Circle(Circle),
    CircleMarker(CircleMarker),
}

#[derive(Serialize, Debug, Clone)]
pub struct Scene {
    pub target: String,
    pub center: Center,
    pub zoom: u8,
    pub layers: Vec<Layer>,
    pub diagnostics: Vec<String>,
}

impl Scene {
    pub fn new(target: impl Into<String>, center: Center, zoom: u8) -> Self {
        Self {
            target: target.into(),
            center,
            zoom,
            layers: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Record a non-fatal note about the render and log it.
    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.target, message);
        self.diagnostics.push(message);
    }

    pub fn circles(&self) -> impl Iterator<Item = &Circle> {
        self.layers.iter().filter_map(|l| match l {
            Layer::Circle(c) => Some(c),
            _ => None,
        })
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.layers.iter().filter_map(|l| match l {
            Layer::Marker(m) => Some(m),
            _ => None,
        })
    }

    pub fn circle_markers(&self) -> impl Iterator<Item = &CircleMarker> {
        self.layers.iter().filter_map(|l| match l {
            Layer::CircleMarker(m) => Some(m),
            _ => None,
        })
    }
}
