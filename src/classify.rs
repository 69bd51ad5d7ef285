//! Keyword-driven classification and prioritization of support content.
//!
//! Two modes serve different stages of the pipeline:
//!
//! * [`categorize`]: fast first-match labelling used during extraction,
//!   with a fixed priority order (cancellation > refund > billing >
//!   shipping > general).
//! * [`score_categories`]: order-independent scoring over the full
//!   taxonomy, used for prioritization. Every category is scored; the
//!   result does not depend on evaluation order.

use std::collections::BTreeMap;

use crate::types::{Category, DocumentChunk};

/// Keyword groups for the fast single-label mode, in priority order.
const LABEL_KEYWORDS: [(Category, &[&str]); 4] = [
    (Category::Cancellation, &["cancel", "cancellation", "unsubscribe"]),
    (Category::Refund, &["refund", "money back", "return"]),
    (Category::Billing, &["billing", "payment", "charge", "invoice"]),
    (Category::Shipping, &["shipping", "delivery", "tracking"]),
];

/// Keyword table for the scoring mode, one entry per non-general category.
const SCORE_KEYWORDS: [(Category, &[&str]); 6] = [
    (
        Category::Cancellation,
        &["cancel", "subscription", "terminate", "end service", "stop billing", "discontinue", "unsubscribe"],
    ),
    (
        Category::Refund,
        &["refund", "money back", "return", "reimbursement", "chargeback", "credit", "partial refund"],
    ),
    (
        Category::Billing,
        &["billing", "payment", "invoice", "charge", "fee", "credit card", "subscription", "auto-renew"],
    ),
    (
        Category::Shipping,
        &["shipping", "delivery", "tracking", "package", "shipment", "carrier", "address"],
    ),
    (
        Category::Account,
        &["account", "profile", "login", "password", "username", "settings", "personal information"],
    ),
    (
        Category::Technical,
        &["error", "bug", "not working", "technical", "support", "troubleshoot", "issue", "problem"],
    ),
];

/// Below this ceiling across all categories, content is forced to general.
const GENERAL_FALLBACK_THRESHOLD: f32 = 0.1;

/// Assigns a single label by first keyword match.
pub fn categorize(text: &str) -> Category {
    let text_lower = text.to_lowercase();
    for (category, keywords) in LABEL_KEYWORDS {
        if keywords.iter().any(|keyword| text_lower.contains(keyword)) {
            return category;
        }
    }
    Category::General
}

/// Scores keyword-hit density for every category.
///
/// Per category: occurrence count in the text plus half-weighted occurrence
/// count in the URL, normalized by text length and capped at 1.0. When no
/// category clears [`GENERAL_FALLBACK_THRESHOLD`], general is forced to 1.0.
/// All returned scores lie in `[0, 1]`.
pub fn score_categories(text: &str, url: &str) -> BTreeMap<Category, f32> {
    let text_lower = text.to_lowercase();
    let url_lower = url.to_lowercase();

    let mut scores: BTreeMap<Category, f32> =
        Category::ALL.iter().map(|&category| (category, 0.0)).collect();

    if !text_lower.is_empty() {
        for (category, keywords) in SCORE_KEYWORDS {
            let mut hits = 0.0f32;
            for keyword in keywords {
                hits += text_lower.matches(keyword).count() as f32;
                hits += url_lower.matches(keyword).count() as f32 * 0.5;
            }
            let density = (hits / text_lower.len() as f32 * 100.0).min(1.0);
            scores.insert(category, density);
        }
    }

    let best = scores.values().copied().fold(0.0f32, f32::max);
    if best < GENERAL_FALLBACK_THRESHOLD {
        scores.insert(Category::General, 1.0);
    }

    scores
}

/// Minimum plausible length for a support document.
const MIN_CONTENT_LENGTH: usize = 50;

const NAV_INDICATORS: [&str; 9] = [
    "home", "about", "contact", "menu", "navigation", "copyright", "©", "all rights reserved",
    "privacy policy",
];

const SUPPORT_KEYWORDS: [&str; 12] = [
    "help", "support", "how to", "faq", "question", "answer", "policy", "terms", "service",
    "customer", "guide", "tutorial",
];

/// Rejects content that is too short or reads like navigation chrome.
pub fn is_support_content(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < MIN_CONTENT_LENGTH {
        return false;
    }

    let text_lower = trimmed.to_lowercase();
    let nav_count = NAV_INDICATORS
        .iter()
        .filter(|indicator| text_lower.contains(*indicator))
        .count();
    let word_count = trimmed.split_whitespace().count();
    if nav_count * 10 > word_count {
        return false;
    }

    SUPPORT_KEYWORDS
        .iter()
        .any(|keyword| text_lower.contains(keyword))
}

/// Orders chunks by how likely they are to answer support questions:
/// support-flavored URLs and titles first, then moderate-length bodies with
/// dense support vocabulary.
pub fn prioritize_chunks(mut chunks: Vec<DocumentChunk>) -> Vec<DocumentChunk> {
    fn priority(chunk: &DocumentChunk) -> f32 {
        let mut score = 0.0f32;

        let url_lower = chunk.url.to_lowercase();
        if ["help", "support", "faq"].iter().any(|k| url_lower.contains(k)) {
            score += 3.0;
        }
        if ["cancel", "refund", "billing"].iter().any(|k| url_lower.contains(k)) {
            score += 2.0;
        }

        let title_lower = chunk.title.to_lowercase();
        if ["help", "support", "faq"].iter().any(|k| title_lower.contains(k)) {
            score += 2.0;
        }

        let len = chunk.content.len();
        if (100..=2000).contains(&len) {
            score += 1.0;
        } else if len > 2000 {
            score += 0.5;
        }

        let content_lower = chunk.content.to_lowercase();
        let keyword_hits = ["help", "support", "how to", "cancel", "refund", "billing"]
            .iter()
            .filter(|k| content_lower.contains(*k))
            .count();
        score + keyword_hits as f32 * 0.5
    }

    chunks.sort_by(|a, b| {
        priority(b)
            .partial_cmp(&priority(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    chunks
}
