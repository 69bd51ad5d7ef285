//! Candidate-URL discovery: well-known support paths plus sitemap entries.

use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use url::Url;

use crate::types::SupportError;

/// Well-known support-path suffixes probed on every domain. The same set
/// doubles as the keyword filter for sitemap entries.
pub const SUPPORT_PATHS: [&str; 9] = [
    "/help",
    "/support",
    "/faq",
    "/docs",
    "/documentation",
    "/customer-service",
    "/billing",
    "/cancellation",
    "/refund",
];

/// Produces candidate documentation URLs for a site, bounded by `max_pages`.
///
/// Probes each entry of [`SUPPORT_PATHS`] and keeps those answering HTTP
/// 200, then appends sitemap `<loc>` entries whose URL mentions a support
/// path. Individual probe failures never fail discovery; they simply
/// contribute nothing.
pub async fn discover_support_urls(client: &Client, base_url: &Url, max_pages: usize) -> Vec<String> {
    let mut discovered = Vec::new();

    for path in SUPPORT_PATHS {
        let Ok(candidate) = base_url.join(path) else {
            continue;
        };
        match client.get(candidate.clone()).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                discovered.push(candidate.to_string());
            }
            Ok(response) => {
                tracing::debug!(url = %candidate, status = %response.status(), "probe miss");
            }
            Err(err) => {
                tracing::debug!(url = %candidate, error = %err, "probe failed");
            }
        }
    }

    match fetch_sitemap(client, base_url).await {
        Ok(entries) => {
            // Normalizing before the crawl's dedupe set keeps fragment and
            // trailing-slash variants of one page from being fetched twice.
            discovered.extend(entries.into_iter().filter_map(|entry| {
                let normalized = match normalize_url(&entry, base_url.host_str()) {
                    Ok(normalized) => normalized,
                    Err(err) => {
                        tracing::debug!(entry, error = %err, "skipping sitemap entry");
                        return None;
                    }
                };
                let entry_lower = normalized.to_lowercase();
                SUPPORT_PATHS
                    .iter()
                    .any(|path| entry_lower.contains(path))
                    .then_some(normalized)
            }));
        }
        Err(err) => {
            tracing::debug!(base = %base_url, error = %err, "sitemap unavailable");
        }
    }

    discovered.truncate(max_pages);
    discovered
}

async fn fetch_sitemap(client: &Client, base_url: &Url) -> Result<Vec<String>, SupportError> {
    let sitemap_url = base_url
        .join("/sitemap.xml")
        .map_err(|err| SupportError::InvalidDocument(err.to_string()))?;
    let response = client.get(sitemap_url).send().await?;
    if response.status() != StatusCode::OK {
        return Ok(Vec::new());
    }
    let body = response.text().await?;
    Ok(parse_sitemap(&body))
}

/// Extracts `<loc>` entries from sitemap XML. The lenient HTML parser copes
/// with the XML fine and with malformed sitemaps better than a strict one.
pub fn parse_sitemap(content: &str) -> Vec<String> {
    let document = Html::parse_document(content);
    let Ok(selector) = Selector::parse("loc") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Normalizes a URL: adds the https scheme, resolves leading-slash paths
/// against `base_domain`, lowercases the host, strips the trailing slash on
/// non-root paths, and always drops fragments.
pub fn normalize_url(url: &str, base_domain: Option<&str>) -> Result<String, SupportError> {
    let trimmed = url.trim();
    let absolute = if trimmed.starts_with('/') {
        let base = base_domain.ok_or_else(|| {
            SupportError::InvalidDocument(format!("relative url '{trimmed}' without a base domain"))
        })?;
        format!("https://{}{}", base.trim().trim_end_matches('/'), trimmed)
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut parsed =
        Url::parse(&absolute).map_err(|err| SupportError::InvalidDocument(err.to_string()))?;
    parsed.set_fragment(None);

    let host = parsed
        .host_str()
        .ok_or_else(|| SupportError::InvalidDocument(format!("url '{trimmed}' has no host")))?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = match parsed.path() {
        "/" | "" => "",
        other => other.trim_end_matches('/'),
    };
    let query = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();

    Ok(format!("{}://{host}{port}{path}{query}", parsed.scheme()))
}

/// Reduces arbitrary input to a lowercased bare host, the identity key for
/// a domain collection.
pub fn normalize_domain(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
