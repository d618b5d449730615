use anyhow::Result;
use std::path::PathBuf;
use tera::Tera;

use crate::models::RenderRequest;
use crate::scene::Scene;

const BUILTIN_MAP_PAGE: &str = include_str!("../data/templates/map.html");

pub struct TemplateEngine {
    tera: Tera,
    base_path: PathBuf,
}

impl TemplateEngine {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        // Ensure the directory exists
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }

        let pattern = format!("{}/**/*.html", base_path.to_string_lossy());
        let mut tera = match Tera::new(&pattern) {
            Ok(t) => t,
            Err(e) => {
                // If it's just "no templates found", initialize empty
                if e.to_string().contains("no templates found") || e.to_string().contains("match any files") {
                    Tera::default()
                } else {
                    return Err(e.into());
                }
            }
        };

        if !tera.get_template_names().any(|name| name == "map.html") {
            tera.add_raw_template("map.html", BUILTIN_MAP_PAGE)?;
        }
        tera.autoescape_on(vec![]);

        Ok(Self { tera, base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    pub fn render(&self, template_name: &str, context: &tera::Context) -> Result<String> {
        let template_file = format!("{}.html", template_name);
        self.tera.render(&template_file, context).map_err(|e| {
            let loaded = self.tera.get_template_names().collect::<Vec<_>>();
            anyhow::anyhow!("Tera Render Error: {}. Requested: '{}'. Loaded: {:?}", e, template_file, loaded)
        })
    }

    /// Full HTML page replaying `scene` onto a Leaflet map.
    pub fn render_page(&self, template_name: &str, scene: &Scene, req: &RenderRequest) -> Result<String> {
        let mut context = tera::Context::new();
        context.insert("target", &scene.target);
        context.insert("scene_json", &script_safe_json(scene)?);
        context.insert("location", &req.location);
        context.insert("index", &req.index);
        context.insert("breakdown", &req.breakdown.clone().unwrap_or_default());
        self.render(template_name, &context)
    }
}

/// Scene JSON that cannot close the surrounding `<script>` element.
fn script_safe_json(scene: &Scene) -> Result<String> {
    Ok(serde_json::to_string(scene)?.replace("</", "<\\/"))
}
