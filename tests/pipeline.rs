//! End-to-end pipeline tests against a mocked support site.
//!
//! A local HTTP server plays the documentation site, the deterministic hash
//! embedding model replaces the provider encoder, and a scripted synthesizer
//! stands in for the completion model, so the whole
//! crawl -> index -> retrieve -> answer path runs offline and repeatably.

use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use tempfile::tempdir;
use url::Url;

use supportsmith::{
    Category, HashEmbeddingModel, KnowledgeIndex, RateLimiter, Settings, SqliteSupportStore,
    SupportAgent, SupportCrawler, SupportError, SupportService, Synthesizer,
};

const BILLING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Billing Help</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <main>
    <h1>Billing</h1>
    <p>Billing happens monthly. Update payment methods under billing settings.
    Invoices list charges for your subscription. Contact support for payment
    questions. Help with billing is available around the clock.</p>
  </main>
  <footer>footer text</footer>
</body>
</html>"#;

const REFUND_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Refund Policy</title></head>
<body>
  <main>
    <h1>Refunds</h1>
    <p>How do I get a refund? Refunds are sent to your original payment method.
    To get a refund, open your orders page and choose the refund option.
    Refund help is available from our support team.</p>
  </main>
</body>
</html>"#;

struct ScriptedSynthesizer(&'static str);

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, _prompt: &str) -> Result<String, SupportError> {
        Ok(self.0.to_string())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn fast_settings(db_path: std::path::PathBuf) -> Settings {
    Settings {
        crawl_delay: Duration::from_millis(0),
        db_path,
        ..Settings::default()
    }
}

fn mock_site(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/billing");
        then.status(200)
            .header("content-type", "text/html")
            .body(BILLING_PAGE);
    });
    server.mock(|when, then| {
        when.method(GET).path("/refund");
        then.status(200)
            .header("content-type", "text/html")
            .body(REFUND_PAGE);
    });
    // Everything else (other probes, sitemap, robots) 404s, which discovery
    // and the robots check both tolerate.
}

fn crawler_for(settings: &Settings) -> SupportCrawler {
    SupportCrawler::new(settings.clone(), std::sync::Arc::new(RateLimiter::default()))
        .expect("crawler builds")
}

type TestService =
    SupportService<HashEmbeddingModel, SqliteSupportStore<HashEmbeddingModel>, ScriptedSynthesizer>;

async fn service_for(settings: &Settings, answer: &'static str) -> TestService {
    let model = HashEmbeddingModel::default();
    let store = SqliteSupportStore::open(&settings.db_path, &model)
        .await
        .expect("store opens");
    let index = KnowledgeIndex::new(model, store, settings.clone());
    let agent = SupportAgent::new(ScriptedSynthesizer(answer));
    let crawler = crawler_for(settings);
    SupportService::new(crawler, index, agent)
}

#[tokio::test]
async fn crawl_extracts_and_categorizes_support_pages() {
    init_tracing();
    let server = MockServer::start_async().await;
    mock_site(&server);

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let crawler = crawler_for(&settings);

    let base = Url::parse(&server.base_url()).expect("mock server url");
    let chunks = crawler.crawl_site(&base).await.expect("crawl succeeds");

    assert_eq!(chunks.len(), 2, "both live support pages are extracted");
    let refund = chunks
        .iter()
        .find(|c| c.title == "Refund Policy")
        .expect("refund page present");
    assert_eq!(refund.category, Category::Refund);
    assert!(refund.content.contains("original payment method"));
    assert!(refund.metadata.contains_key("scraped_at"));

    let billing = chunks
        .iter()
        .find(|c| c.title == "Billing Help")
        .expect("billing page present");
    assert_eq!(billing.category, Category::Billing);
    assert!(!billing.content.contains("Home"), "nav chrome is stripped");
    assert!(!billing.content.contains("footer text"));
}

#[tokio::test]
async fn refund_question_retrieves_the_refund_page_first() {
    init_tracing();
    let server = MockServer::start_async().await;
    mock_site(&server);

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "You can request a refund from your orders page.").await;

    let crawler = crawler_for(&settings);
    let base = Url::parse(&server.base_url()).expect("mock server url");
    let chunks = crawler.crawl_site(&base).await.expect("crawl succeeds");
    let indexed = service
        .process_documents("shop.example", chunks)
        .await
        .expect("indexing succeeds");
    assert_eq!(indexed, 2);

    let response = service
        .process_query("shop.example", "How do I get a refund?", None)
        .await;

    assert!(!response.sources.is_empty());
    assert_eq!(response.sources[0].title, "Refund Policy");
    assert_eq!(response.sources[0].category, Category::Refund);
    assert!(
        (0.3..=0.9).contains(&response.confidence),
        "confidence stays in its band, got {}",
        response.confidence
    );
    assert_eq!(
        response.suggested_actions,
        vec![
            "Check refund eligibility".to_string(),
            "Prepare order details".to_string()
        ],
        "refund triggers fire, billing triggers do not"
    );
}

#[tokio::test]
async fn cancellation_question_with_contact_answer_suggests_contact_support() {
    init_tracing();
    let server = MockServer::start_async().await;
    mock_site(&server);

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(
        &settings,
        "To cancel your plan, contact our support team from account settings.",
    )
    .await;

    let crawler = crawler_for(&settings);
    let base = Url::parse(&server.base_url()).expect("mock server url");
    let chunks = crawler.crawl_site(&base).await.expect("crawl succeeds");
    service
        .process_documents("shop.example", chunks)
        .await
        .expect("indexing succeeds");

    let response = service
        .process_query("shop.example", "How can I cancel my subscription?", None)
        .await;

    assert!(response.suggested_actions.len() <= 3);
    assert_eq!(response.suggested_actions[0], "Go to Account Settings");
    assert!(
        response
            .suggested_actions
            .contains(&"Contact Support".to_string()),
        "the answer mentions contacting support"
    );
}

#[tokio::test]
async fn querying_an_unknown_domain_gets_the_no_docs_fallback() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "unused").await;

    let response = service
        .process_query("never-crawled.example", "Where is my order?", None)
        .await;

    assert!(response.answer.contains("couldn't find specific information"));
    assert!(response.sources.is_empty());
    assert!((response.confidence - 0.1).abs() < f32::EPSILON);
    assert_eq!(
        response.suggested_actions,
        vec!["Contact customer support directly".to_string()]
    );
}

#[tokio::test]
async fn reindexing_replaces_stale_chunks() {
    init_tracing();
    use supportsmith::DocumentChunk;

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "unused").await;

    let first = vec![
        DocumentChunk::new(
            "Our refund policy: refunds are supported within thirty days of purchase. \
             Contact the support team for help with refund questions.",
            "Refund Policy",
            "https://shop.example/refund",
            Category::Refund,
        ),
        DocumentChunk::new(
            "Shipping help: delivery takes five business days and tracking numbers \
             arrive by email. Our support team answers shipping questions.",
            "Shipping Help",
            "https://shop.example/shipping",
            Category::Shipping,
        ),
    ];
    let written = service
        .process_documents("shop.example", first)
        .await
        .expect("first indexing succeeds");
    assert_eq!(written, 2);
    assert_eq!(service.indexed_chunks("shop.example").await.unwrap(), 2);

    let second = vec![DocumentChunk::new(
        "Updated refund policy: refunds are supported within sixty days. \
         The support team handles every refund question by email.",
        "Refund Policy",
        "https://shop.example/refund",
        Category::Refund,
    )];
    let written = service
        .process_documents("shop.example", second)
        .await
        .expect("second indexing succeeds");
    assert_eq!(written, 1);
    assert_eq!(
        service.indexed_chunks("shop.example").await.unwrap(),
        1,
        "old chunks are gone after the rewrite"
    );

    let response = service
        .process_query("shop.example", "How long do I have to request a refund?", None)
        .await;
    assert_eq!(response.sources.len(), 1, "only current chunks are searchable");
}

#[tokio::test]
async fn indexing_nothing_keeps_existing_data() {
    init_tracing();
    use supportsmith::DocumentChunk;

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "unused").await;

    let docs = vec![DocumentChunk::new(
        "Account help: reset your password from the login page. Our support \
         team can unlock accounts and answer profile questions.",
        "Account Help",
        "https://shop.example/account",
        Category::Account,
    )];
    service
        .process_documents("shop.example", docs)
        .await
        .expect("indexing succeeds");
    assert_eq!(service.indexed_chunks("shop.example").await.unwrap(), 1);

    let written = service
        .process_documents("shop.example", Vec::new())
        .await
        .expect("empty indexing is a no-op");
    assert_eq!(written, 0);
    assert_eq!(
        service.indexed_chunks("shop.example").await.unwrap(),
        1,
        "an empty crawl must not wipe a good index"
    );
}

#[tokio::test]
async fn forgetting_a_domain_leaves_others_alone() {
    init_tracing();
    use supportsmith::DocumentChunk;

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "unused").await;

    let doc = |domain: &str| {
        vec![DocumentChunk::new(
            format!(
                "Support guide for {domain}: billing questions, refund help, and \
                 account settings are all covered by the support team."
            ),
            "Support Guide",
            format!("https://{domain}/help"),
            Category::General,
        )]
    };

    service
        .process_documents("a.example", doc("a.example"))
        .await
        .unwrap();
    service
        .process_documents("b.example", doc("b.example"))
        .await
        .unwrap();

    let dropped = service.forget_domain("a.example").await.unwrap();
    assert_eq!(dropped, 1);
    assert_eq!(service.indexed_chunks("a.example").await.unwrap(), 0);
    assert_eq!(service.indexed_chunks("b.example").await.unwrap(), 1);
}

#[tokio::test]
async fn domain_casing_resolves_to_one_collection() {
    use supportsmith::DocumentChunk;

    init_tracing();
    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "Refunds take ten days.").await;

    let docs = vec![DocumentChunk::new(
        "Refund help: refunds are supported within thirty days. The support \
         team answers every refund question by email.",
        "Refund Policy",
        "https://shop.example/refund",
        Category::Refund,
    )];
    service
        .process_documents("Shop.Example", docs)
        .await
        .expect("indexing succeeds");

    assert_eq!(
        service.indexed_chunks("shop.example").await.unwrap(),
        1,
        "mixed-case and lowercase name the same collection"
    );

    let response = service
        .process_query("shop.example", "How do I get a refund?", None)
        .await;
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].title, "Refund Policy");

    let dropped = service.forget_domain("SHOP.EXAMPLE").await.unwrap();
    assert_eq!(dropped, 1);
}

#[tokio::test]
async fn refresh_reports_crawling_then_a_terminal_phase() {
    use std::sync::Mutex;
    use supportsmith::CrawlPhase;

    init_tracing();
    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let service = service_for(&settings, "unused").await;

    // An empty domain fails URL construction before any network I/O, which
    // exercises the full status lifecycle offline.
    let phases: Mutex<Vec<CrawlPhase>> = Mutex::new(Vec::new());
    let result = service
        .refresh_domain_with_status("", |status| {
            phases.lock().unwrap().push(status.phase);
        })
        .await;

    assert!(result.is_err());
    assert_eq!(
        *phases.lock().unwrap(),
        vec![CrawlPhase::Crawling, CrawlPhase::Error],
        "observers see the start of the crawl and its terminal phase"
    );
}

#[tokio::test]
async fn sitemap_url_variants_are_fetched_once() {
    init_tracing();
    let server = MockServer::start_async().await;

    let refund = server.mock(|when, then| {
        when.method(GET).path("/refund");
        then.status(200)
            .header("content-type", "text/html")
            .body(REFUND_PAGE);
    });
    let base = server.base_url();
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{base}/refund#policy</loc></url>
          <url><loc>{base}/refund/</loc></url>
        </urlset>"#
    );
    server.mock(|when, then| {
        when.method(GET).path("/sitemap.xml");
        then.status(200)
            .header("content-type", "application/xml")
            .body(sitemap);
    });

    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path().join("chunks.sqlite"));
    let crawler = crawler_for(&settings);

    let base_url = Url::parse(&base).expect("mock server url");
    let chunks = crawler.crawl_site(&base_url).await.expect("crawl succeeds");

    assert_eq!(chunks.len(), 1);
    // One discovery probe plus one crawl fetch; the fragment and
    // trailing-slash sitemap variants collapse into the same URL.
    assert_eq!(refund.hits_async().await, 2);
}
