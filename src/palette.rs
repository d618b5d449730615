//! Fixed visual constants and the two lookup tables the renderer colors and
//! decorates layers with.

pub const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const MAX_ZOOM: u8 = 19;
pub const ATTRIBUTION: &str = "© OpenStreetMap contributors";
pub const DEFAULT_ZOOM: u8 = 15;
pub const ORIGIN_LABEL: &str = "Your Location";

pub const BUFFER_STROKE: &str = "#ea580c";
pub const BUFFER_FILL: &str = "#f97316";
pub const ICON_COLOR: &str = "#f97316";
pub const ORIGIN_COLOR: &str = "#2563eb";
pub const CIRCLE_MARKER_COLOR: &str = "#ff0000";
pub const OVERLAY_COLOR: &str = "#0ea5e9";

pub const DEFAULT_ICON: &str = "fa-map-marker-alt";

/// Font Awesome class for a POI category.
pub fn category_icon(category: &str) -> &'static str {
    match category {
        "metro" => "fa-subway",
        "bus" => "fa-bus",
        "grocery" => "fa-shopping-cart",
        "restaurants" => "fa-utensils",
        "parks" => "fa-tree",
        "schools" => "fa-graduation-cap",
        "healthcare" => "fa-hospital",
        _ => DEFAULT_ICON,
    }
}

/// Five-bucket scale for gradient scores, darkest first.
pub fn score_color(score: f64) -> &'static str {
    if score > 0.8 {
        "#ea580c"
    } else if score > 0.6 {
        "#f97316"
    } else if score > 0.4 {
        "#fb923c"
    } else if score > 0.2 {
        "#fdba74"
    } else {
        "#ffedd5"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_have_icons() {
        assert_eq!(category_icon("metro"), "fa-subway");
        assert_eq!(category_icon("bus"), "fa-bus");
        assert_eq!(category_icon("grocery"), "fa-shopping-cart");
        assert_eq!(category_icon("restaurants"), "fa-utensils");
        assert_eq!(category_icon("parks"), "fa-tree");
        assert_eq!(category_icon("schools"), "fa-graduation-cap");
        assert_eq!(category_icon("healthcare"), "fa-hospital");
    }

    #[test]
    fn unknown_category_falls_back() {
        for category in ["", "Metro", "library", "parks "] {
            assert_eq!(category_icon(category), DEFAULT_ICON);
        }
    }

    #[test]
    fn score_buckets() {
        assert_eq!(score_color(0.9), "#ea580c");
        assert_eq!(score_color(0.7), "#f97316");
        assert_eq!(score_color(0.5), "#fb923c");
        assert_eq!(score_color(0.3), "#fdba74");
        assert_eq!(score_color(0.0), "#ffedd5");
    }

    #[test]
    fn bucket_boundaries_are_exclusive() {
        assert_eq!(score_color(0.8), "#f97316");
        assert_eq!(score_color(0.6), "#fb923c");
        assert_eq!(score_color(0.4), "#fdba74");
        assert_eq!(score_color(0.2), "#ffedd5");
        assert_eq!(score_color(1.0), "#ea580c");
        assert_eq!(score_color(f64::NAN), "#ffedd5");
    }
}
