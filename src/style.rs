use serde_json::{json, Value};

use crate::models::Center;
use crate::palette;
use crate::scene::{Layer, Scene};

const CIRCLE_SEGMENTS: usize = 64;
const EARTH_CIRCUMFERENCE_M: f64 = 40075016.686;
// Web Mercator limit; past it degrees of longitude shrink toward zero meters.
const MAX_RING_LAT: f64 = 85.05112878;

/// MapLibre style document for a scene.
pub fn to_style(scene: &Scene) -> Value {
    let mut sources = serde_json::Map::new();
    let mut layers = Vec::new();

    for (i, layer) in scene.layers.iter().enumerate() {
        match layer {
            Layer::Tile(tile) => {
                let source_id = format!("tiles_{}", i);
                sources.insert(
                    source_id.clone(),
                    json!({
                        "type": "raster",
                        "tiles": expand_subdomains(&tile.url),
                        "tileSize": 256,
                        "maxzoom": tile.max_zoom,
                        "attribution": tile.attribution,
                    }),
                );
                layers.push(json!({ "id": format!("tiles_layer_{}", i), "type": "raster", "source": source_id, "minzoom": 0, "maxzoom": 22 }));
            }
            Layer::Circle(circle) => {
                let source_id = format!("circle_source_{}", i);
                let ring = circle_ring(circle.center, circle.radius_m);
                sources.insert(
                    source_id.clone(),
                    json!({ "type": "geojson", "data": { "type": "Feature", "geometry": { "type": "Polygon", "coordinates": [ring] }, "properties": { "popup": circle.popup } } }),
                );
                layers.push(json!({ "id": format!("circle_fill_{}", i), "type": "fill", "source": source_id, "paint": { "fill-color": circle.style.fill_color, "fill-opacity": circle.style.fill_opacity } }));
                layers.push(json!({ "id": format!("circle_stroke_{}", i), "type": "line", "source": source_id, "paint": { "line-color": circle.style.color, "line-width": circle.style.weight, "line-opacity": circle.style.opacity } }));
            }
            Layer::Marker(marker) => {
                let source_id = format!("marker_source_{}", i);
                let (icon, color) = match &marker.icon {
                    Some(icon) => (Some(icon.class.as_str()), icon.color.as_str()),
                    None => (None, palette::ORIGIN_COLOR),
                };
                sources.insert(
                    source_id.clone(),
                    point_source(marker.position, json!({ "popup": marker.popup, "icon": icon, "category": marker.category })),
                );
                layers.push(json!({ "id": format!("marker_layer_{}", i), "type": "circle", "source": source_id, "paint": { "circle-radius": 8, "circle-color": color, "circle-stroke-color": "#ffffff", "circle-stroke-width": 2 } }));
            }
            Layer::CircleMarker(dot) => {
                let source_id = format!("dot_source_{}", i);
                sources.insert(
                    source_id.clone(),
                    point_source(dot.position, json!({ "popup": dot.popup, "category": dot.category })),
                );
                layers.push(json!({ "id": format!("dot_layer_{}", i), "type": "circle", "source": source_id, "paint": {
                    "circle-radius": dot.radius_px,
                    "circle-color": dot.style.fill_color,
                    "circle-opacity": dot.style.fill_opacity,
                    "circle-stroke-color": dot.style.color,
                    "circle-stroke-width": dot.style.weight,
                    "circle-stroke-opacity": dot.style.opacity
                } }));
            }
        }
    }

    json!({
        "version": 8,
        "name": scene.target,
        "center": [scene.center.lon, scene.center.lat],
        "zoom": scene.zoom,
        "sources": sources,
        "layers": layers,
    })
}

fn point_source(position: Center, properties: Value) -> Value {
    json!({ "type": "geojson", "data": { "type": "Feature", "geometry": { "type": "Point", "coordinates": [position.lon, position.lat] }, "properties": properties } })
}

/// MapLibre has no `{s}` placeholder, so list one URL per subdomain.
fn expand_subdomains(url: &str) -> Vec<String> {
    if url.contains("{s}") {
        ["a", "b", "c"].iter().map(|s| url.replace("{s}", s)).collect()
    } else {
        vec![url.to_string()]
    }
}

/// Closed `[lon, lat]` ring approximating a circle of `radius_m` meters.
fn circle_ring(center: Center, radius_m: f64) -> Vec<[f64; 2]> {
    let meters_per_degree_lat = EARTH_CIRCUMFERENCE_M / 360.0;
    let lat = center.lat.clamp(-MAX_RING_LAT, MAX_RING_LAT);
    let meters_per_degree_lon = meters_per_degree_lat * lat.to_radians().cos();
    let mut coordinates = Vec::with_capacity(CIRCLE_SEGMENTS + 1);
    for j in 0..CIRCLE_SEGMENTS {
        let angle = (j as f64) * 2.0 * std::f64::consts::PI / (CIRCLE_SEGMENTS as f64);
        let dx = radius_m * angle.cos();
        let dy = radius_m * angle.sin();
        coordinates.push([center.lon + (dx / meters_per_degree_lon), lat + (dy / meters_per_degree_lat)]);
    }
    if let Some(first) = coordinates.first().copied() {
        coordinates.push(first);
    }
    coordinates
}
