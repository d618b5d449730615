//! Builds scenes from walkability results.

use std::collections::HashSet;

use tera::escape_html;
use tracing::{debug, info};

use crate::config::{MapOptions, MarkerStyle};
use crate::models::{FeatureCollection, PointOfInterest, RenderRequest};
use crate::palette::{self, category_icon, score_color};
use crate::scene::{Circle, CircleMarker, Icon, Layer, Marker, PathStyle, Scene, TileLayer};

const GRADIENT_RADIUS_PX: f64 = 6.0;
const POI_RADIUS_PX: f64 = 7.0;
const OVERLAY_RADIUS_PX: f64 = 5.0;

pub struct MapRenderer {
    options: MapOptions,
}

impl MapRenderer {
    pub fn new(options: MapOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Main walkability view: tiles, origin marker, buffer rings and nearby points.
    pub fn render(&self, target: &str, req: &RenderRequest) -> Scene {
        let mut scene = self.base_scene(target, req);

        scene.add(Layer::Marker(Marker {
            position: req.center,
            icon: None,
            category: None,
            popup: Some(self.options.origin_label.clone()),
        }));

        let suppressed = self.add_buffers(&mut scene, req);
        self.add_nearby(&mut scene, req, &suppressed);

        info!(
            "rendered {} with {} circles, {} markers",
            scene.target,
            scene.circles().count(),
            scene.markers().count() + scene.circle_markers().count()
        );
        scene
    }

    /// Secondary heat-style view. `None` when the request carries no gradient layer.
    pub fn render_gradient(&self, target: &str, req: &RenderRequest) -> Option<Scene> {
        let layer = req.gradient_layer.as_ref()?;
        let mut scene = self.base_scene(target, req);

        let mut added = 0;
        for feature in &layer.features {
            let Some(position) = feature.position() else {
                debug!("gradient feature without coordinates skipped");
                continue;
            };
            let score = feature.number("score").unwrap_or(0.0);
            let color = score_color(score);
            scene.add(Layer::CircleMarker(CircleMarker {
                position,
                radius_px: GRADIENT_RADIUS_PX,
                style: PathStyle {
                    color: color.to_string(),
                    fill_color: color.to_string(),
                    weight: 1.0,
                    opacity: 1.0,
                    fill_opacity: 0.8,
                },
                category: None,
                popup: Some(format!("Score: {:.2}", score)),
            }));
            added += 1;
        }

        if added == 0 {
            scene.note("gradient layer has no renderable features");
        }
        debug!("gradient {} with {} points", scene.target, added);
        Some(scene)
    }

    /// Adds transit stops from a static GeoJSON file. Returns how many were added.
    pub fn add_overlay(&self, scene: &mut Scene, overlay: &FeatureCollection) -> usize {
        let mut added = 0;
        for feature in &overlay.features {
            let Some(position) = feature.position() else {
                continue;
            };
            let label = feature.text("stop_name").unwrap_or("Stop");
            scene.add(Layer::CircleMarker(CircleMarker {
                position,
                radius_px: OVERLAY_RADIUS_PX,
                style: PathStyle {
                    color: palette::OVERLAY_COLOR.to_string(),
                    fill_color: palette::OVERLAY_COLOR.to_string(),
                    weight: 1.0,
                    opacity: 1.0,
                    fill_opacity: 0.7,
                },
                category: None,
                popup: Some(escape_html(label)),
            }));
            added += 1;
        }
        debug!("overlay added {} stops to {}", added, scene.target);
        added
    }

    fn base_scene(&self, target: &str, req: &RenderRequest) -> Scene {
        let mut scene = Scene::new(target, req.center, self.options.zoom);
        scene.add(Layer::Tile(TileLayer {
            url: self.options.tile_url.clone(),
            max_zoom: self.options.max_zoom,
            attribution: self.options.attribution.clone(),
        }));
        scene
    }

    /// Draws one ring per radius and returns the categories whose ring was gated off.
    fn add_buffers(&self, scene: &mut Scene, req: &RenderRequest) -> HashSet<String> {
        let mut suppressed = HashSet::new();
        let mut drawn = HashSet::new();
        let Some(buffers) = &req.buffers_m else {
            return suppressed;
        };

        if let Some(breakdown) = &req.breakdown {
            if breakdown.len() != buffers.len() {
                scene.note(format!(
                    "breakdown has {} entries for {} buffers",
                    breakdown.len(),
                    buffers.len()
                ));
            }
        }

        for (i, &radius) in buffers.iter().enumerate() {
            if !radius.is_finite() || radius <= 0.0 {
                debug!("buffer {} has unusable radius {}", i, radius);
                continue;
            }

            let entry = req.breakdown.as_ref().and_then(|b| b.get(i));
            let popup = match entry {
                Some(entry) => {
                    if !entry.is_weighted() || req.nearby_count(entry) <= 0 {
                        debug!("buffer for {} suppressed", entry.name);
                        suppressed.insert(entry.name.clone());
                        continue;
                    }
                    drawn.insert(entry.name.clone());
                    format!("{} buffer ({} m)", escape_html(&entry.name), radius)
                }
                None => format!("{} m buffer", radius),
            };

            scene.add(Layer::Circle(Circle {
                center: req.center,
                radius_m: radius,
                style: PathStyle {
                    color: palette::BUFFER_STROKE.to_string(),
                    fill_color: palette::BUFFER_FILL.to_string(),
                    weight: 1.0,
                    opacity: 0.3,
                    fill_opacity: 0.1,
                },
                popup: Some(popup),
            }));
        }

        suppressed.retain(|name| !drawn.contains(name));
        suppressed
    }

    fn add_nearby(&self, scene: &mut Scene, req: &RenderRequest, suppressed: &HashSet<String>) {
        let points = match &req.nearby {
            Some(points) if !points.is_empty() => points,
            _ => {
                scene.note("no nearby points to display");
                return;
            }
        };

        for poi in points {
            let Some(position) = poi.position() else {
                debug!("{} point without coordinates skipped", poi.category);
                continue;
            };
            if suppressed.contains(&poi.category) {
                continue;
            }
            let popup = point_popup(poi);
            let layer = match self.options.marker_style {
                MarkerStyle::Icon => Layer::Marker(Marker {
                    position,
                    icon: Some(Icon {
                        class: category_icon(&poi.category).to_string(),
                        color: palette::ICON_COLOR.to_string(),
                    }),
                    category: Some(poi.category.clone()),
                    popup: Some(popup),
                }),
                MarkerStyle::Circle => Layer::CircleMarker(CircleMarker {
                    position,
                    radius_px: POI_RADIUS_PX,
                    style: PathStyle {
                        color: palette::CIRCLE_MARKER_COLOR.to_string(),
                        fill_color: palette::CIRCLE_MARKER_COLOR.to_string(),
                        weight: 1.0,
                        opacity: 1.0,
                        fill_opacity: 0.8,
                    },
                    category: Some(poi.category.clone()),
                    popup: Some(popup),
                }),
            };
            scene.add(layer);
        }
    }
}

fn point_popup(poi: &PointOfInterest) -> String {
    format!(
        "<strong>{}</strong><br><small>{}</small>",
        escape_html(poi.display_name()),
        escape_html(&poi.category)
    )
}
