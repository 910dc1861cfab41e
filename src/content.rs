// Blog posts and static pages (privacy policy, cookie policy)

use serde_json::Value;

use crate::dealer_api::DealerApi;
use crate::error::ApiError;
use crate::models::{BlogPost, StaticPage};
use crate::response::{unwrap_object, unwrap_records};

pub async fn blogs(api: &DealerApi, page: u32, limit: u32) -> Result<Vec<BlogPost>, ApiError> {
    let response = api.fetch_blogs(page, limit).await?;
    let posts = parse_blogs(&response);
    tracing::debug!(page, count = posts.len(), "Fetched blog posts");
    Ok(posts)
}

pub async fn static_page(api: &DealerApi, slug: &str) -> Result<Option<StaticPage>, ApiError> {
    let response = match api.fetch_static_page(slug).await {
        Ok(response) => response,
        Err(ApiError::Status { status: 404, .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(parse_static_page(&response, slug))
}

fn parse_blogs(response: &Value) -> Vec<BlogPost> {
    unwrap_records(response)
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<BlogPost>(record) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed blog post");
                None
            }
        })
        .collect()
}

fn parse_static_page(response: &Value, slug: &str) -> Option<StaticPage> {
    let body = unwrap_object(response)?;
    let mut page: StaticPage = serde_json::from_value(body.clone()).ok()?;
    if page.content.trim().is_empty() {
        return None;
    }
    if page.slug.is_empty() {
        page.slug = slug.to_string();
    }
    Some(page)
}
