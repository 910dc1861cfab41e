// Builds absolute image URLs from CDN-relative paths

use reqwest::Client;

use crate::config::ImageSettings;
use crate::models::ListingImage;

#[derive(Debug, Clone)]
pub struct ImageResolver {
    origins: Vec<String>,
    placeholder: String,
}

impl ImageResolver {
    pub fn new(origins: Vec<String>, placeholder: impl Into<String>) -> Self {
        Self {
            origins: origins
                .into_iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            placeholder: placeholder.into(),
        }
    }

    pub fn from_settings(settings: &ImageSettings) -> Self {
        Self::new(settings.cdn_origins.clone(), settings.placeholder_uri.clone())
    }

    pub fn placeholder(&self) -> ListingImage {
        ListingImage::from_uri(self.placeholder.clone())
    }

    /// More than one origin means a missing image may still be served elsewhere.
    pub fn has_fallback_origins(&self) -> bool {
        self.origins.len() > 1
    }

    pub fn is_placeholder(&self, uri: &str) -> bool {
        uri == self.placeholder
    }

    /// Absolute URL on the primary origin. Already-absolute URLs pass through.
    pub fn primary_uri(&self, path: &str) -> String {
        self.candidates(path)
            .into_iter()
            .next()
            .unwrap_or_else(|| path.to_string())
    }

    /// One URL per configured origin, in the order they should be tried.
    pub fn candidates(&self, path: &str) -> Vec<String> {
        let path = path.trim();
        if is_absolute(path) {
            return vec![path.to_string()];
        }
        let path = path.trim_start_matches('/');
        self.origins
            .iter()
            .map(|origin| format!("{}/{}", origin, path))
            .collect()
    }

    /// Tries each candidate with a HEAD request and returns the first that answers 2xx.
    pub async fn resolve_first_reachable(&self, client: &Client, path: &str) -> String {
        for candidate in self.candidates(path) {
            match client.head(&candidate).send().await {
                Ok(response) if response.status().is_success() => return candidate,
                Ok(response) => {
                    tracing::debug!(url = %candidate, status = %response.status(), "Image origin rejected request");
                }
                Err(e) => {
                    tracing::debug!(url = %candidate, error = %e, "Image origin unreachable");
                }
            }
        }
        tracing::warn!(path, "No image origin served path, using placeholder");
        self.placeholder.clone()
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://") || path.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new(
            vec!["https://cdn-a.test/".into(), "https://cdn-b.test".into()],
            "/static/car-placeholder.png",
        )
    }

    #[test]
    fn relative_paths_get_every_origin() {
        assert_eq!(
            resolver().candidates("/uploads/car.jpg"),
            vec!["https://cdn-a.test/uploads/car.jpg", "https://cdn-b.test/uploads/car.jpg"]
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let r = resolver();
        assert_eq!(r.primary_uri("https://img.test/x.png"), "https://img.test/x.png");
        assert_eq!(r.candidates("http://img.test/x.png").len(), 1);
    }

    #[test]
    fn no_origins_leaves_path_untouched() {
        let r = ImageResolver::new(Vec::new(), "placeholder.png");
        assert_eq!(r.primary_uri("uploads/a.jpg"), "uploads/a.jpg");
        assert_eq!(r.placeholder().uri, "placeholder.png");
    }
}
