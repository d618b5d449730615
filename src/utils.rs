use reqwest::Client;
use std::error::Error;

use crate::models::FeatureCollection;

pub async fn fetch_overlay(client: &Client, url: &str) -> Result<FeatureCollection, Box<dyn Error + Send + Sync>> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let collection = resp.json::<FeatureCollection>().await?;
    Ok(collection)
}

/// Container ids end up in HTML attributes and CSS selectors.
pub fn is_valid_target(target: &str) -> bool {
    !target.is_empty()
        && target.len() <= 64
        && target.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
