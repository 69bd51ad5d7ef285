//! Best-effort robots.txt check. Anything short of an explicit wildcard
//! disallow (including a missing or unreachable robots.txt) allows the
//! crawl.

use reqwest::{Client, StatusCode};
use url::Url;

/// Returns `true` when `url` may be fetched according to the site's
/// robots.txt wildcard group. Fails open: any error means "allowed".
pub async fn can_crawl_url(client: &Client, url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let Ok(robots_url) = parsed.join("/robots.txt") else {
        return true;
    };

    let body = match client.get(robots_url.clone()).send().await {
        Ok(response) if response.status() == StatusCode::OK => match response.text().await {
            Ok(body) => body,
            Err(_) => return true,
        },
        Ok(_) => return true,
        Err(err) => {
            tracing::debug!(url = %robots_url, error = %err, "robots.txt unavailable");
            return true;
        }
    };

    path_allowed(&body, parsed.path())
}

/// Evaluates the `User-agent: *` group's Disallow rules against `path`.
fn path_allowed(robots: &str, path: &str) -> bool {
    let mut in_wildcard_group = false;
    for line in robots.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => in_wildcard_group = value == "*",
            "disallow" if in_wildcard_group => {
                if !value.is_empty() && path.starts_with(value) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}
