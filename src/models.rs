use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BreakdownEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub weight: Option<f64>,
    pub nearby_count: Option<i64>,
    pub score: Option<f64>,
}

impl BreakdownEntry {
    /// Entries without a positive weight are gated off, a missing weight included.
    pub fn is_weighted(&self) -> bool {
        self.weight.is_some_and(|w| w > 0.0)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Option<serde_json::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PointOfInterest {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    pub name: Option<String>,
    pub stop_name: Option<String>,
}

impl PointOfInterest {
    /// `[lon, lat]` swapped into `Center` order, `None` when the geometry is unusable.
    pub fn position(&self) -> Option<Center> {
        position_of(self.geometry.as_ref())
    }

    pub fn display_name(&self) -> &str {
        [self.name.as_deref(), self.stop_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or(self.category.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    pub fn position(&self) -> Option<Center> {
        position_of(self.geometry.as_ref())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(|v| v.as_f64())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RenderRequest {
    pub center: Center,
    pub location: Option<String>,
    pub index: Option<f64>,
    pub buffers_m: Option<Vec<f64>>,
    pub breakdown: Option<Vec<BreakdownEntry>>,
    pub nearby: Option<Vec<PointOfInterest>>,
    pub gradient_layer: Option<FeatureCollection>,
}

impl RenderRequest {
    /// Count for a breakdown entry, derived from `nearby` when the backend left it out.
    pub fn nearby_count(&self, entry: &BreakdownEntry) -> i64 {
        entry.nearby_count.unwrap_or_else(|| {
            self.nearby
                .iter()
                .flatten()
                .filter(|poi| poi.category == entry.name)
                .count() as i64
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn position_of(geometry: Option<&Geometry>) -> Option<Center> {
    let coordinates = geometry?.coordinates.as_ref()?.as_array()?;
    let lon = coordinates.first()?.as_f64()?;
    let lat = coordinates.get(1)?.as_f64()?;
    (lon.is_finite() && lat.is_finite()).then_some(Center { lat, lon })
}
