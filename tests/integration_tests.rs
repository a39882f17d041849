//! Integration tests for paper-harvest
//!
//! Every adapter is pointed at a local wiremock server, so these tests run
//! without network access.

mod common;

use paper_harvest::models::{DownloadRequest, ReadRequest, SearchQuery, SourceType};
use paper_harvest::sources::{Source, SourceCapabilities, SourceRegistry};

fn expected_source_count() -> usize {
    let mut count = 0;

    if cfg!(feature = "source-arxiv") {
        count += 1;
    }
    if cfg!(feature = "source-pubmed") {
        count += 1;
    }
    if cfg!(feature = "source-biorxiv") {
        // bioRxiv and medRxiv
        count += 2;
    }
    if cfg!(feature = "source-semantic") {
        count += 1;
    }
    if cfg!(feature = "source-iacr") {
        count += 1;
    }
    if cfg!(feature = "source-google_scholar") {
        count += 1;
    }
    if cfg!(feature = "source-sci_hub") {
        count += 1;
    }

    count
}

#[test]
fn test_registry_matches_enabled_features() {
    let registry = SourceRegistry::new().unwrap();
    assert_eq!(registry.len(), expected_source_count());

    for id in registry.ids() {
        let source_type = SourceType::from_id(id).expect("registered id is a known source type");
        assert_eq!(source_type.id(), id);
    }
}

#[test]
fn test_registry_capabilities_are_consistent() {
    let registry = SourceRegistry::new().unwrap();
    for source in registry.all() {
        let caps = source.capabilities();
        assert_eq!(source.supports_search(), caps.contains(SourceCapabilities::SEARCH));
        assert_eq!(source.supports_download(), caps.contains(SourceCapabilities::DOWNLOAD));
        // Anything that downloads can also read the file back
        if caps.contains(SourceCapabilities::DOWNLOAD) {
            assert!(source.supports_read(), "{} downloads but cannot read", source.id());
        }
    }
}

#[cfg(feature = "source-arxiv")]
mod arxiv {
    use super::*;
    use paper_harvest::sources::ArxivSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_keeps_requested_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf/2301.12345v2.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(common::pdf_with_pages(&["Second revision"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = ArxivSource::new()
            .unwrap()
            .with_endpoints(format!("{}/api/query", server.uri()), format!("{}/pdf", server.uri()));

        let tmp = tempfile::tempdir().unwrap();
        let request = ReadRequest::new("arxiv:2301.12345v2", tmp.path().to_string_lossy());
        let result = source.read(&request).await.unwrap();

        assert!(result.text.contains("Second revision"));
        assert!(tmp.path().join("2301.12345v2.pdf").exists());
        assert!(!tmp.path().join("2301.12345.pdf").exists());
    }
}

#[cfg(feature = "source-pubmed")]
mod pubmed {
    use super::*;
    use paper_harvest::sources::PubMedSource;

    #[tokio::test]
    async fn test_download_unsupported_and_read_explains() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let source = PubMedSource::new().unwrap();

        let err = source
            .download(&DownloadRequest::new("12345678", &dir))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());

        let result = source
            .read(&ReadRequest::new("12345678", &dir))
            .await
            .unwrap();
        assert!(result.text.contains("cannot be read directly"));

        assert!(!tmp.path().join("12345678.pdf").exists());
    }
}

#[cfg(feature = "source-semantic")]
mod semantic {
    use super::*;
    use common::semantic_item;
    use paper_harvest::sources::SemanticScholarSource;
    use paper_harvest::utils::{ApiResult, BackoffPolicy};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> SemanticScholarSource {
        SemanticScholarSource::new()
            .unwrap()
            .with_api_url(server.uri())
            .with_backoff(BackoffPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(10),
            })
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let server = MockServer::start().await;
        let items: Vec<_> = (0..7)
            .map(|i| semantic_item(&format!("p{}", i), Some("A paper")))
            .collect();
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 7,
                "data": items
            })))
            .mount(&server)
            .await;

        let response = source(&server)
            .search(&SearchQuery::new("graphs").max_results(3))
            .await
            .unwrap();
        assert_eq!(response.papers.len(), 3);
    }

    #[tokio::test]
    async fn test_item_without_title_is_skipped() {
        let server = MockServer::start().await;
        let mut items: Vec<_> = (0..5)
            .map(|i| semantic_item(&format!("p{}", i), Some("Titled")))
            .collect();
        items.insert(2, semantic_item("untitled", None));
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": items })),
            )
            .mount(&server)
            .await;

        let response = source(&server)
            .search(&SearchQuery::new("graphs").max_results(10))
            .await
            .unwrap();
        assert_eq!(response.papers.len(), 5);
        assert!(response.papers.iter().all(|p| p.paper_id != "untitled"));
    }

    #[tokio::test]
    async fn test_backoff_doubles_between_rate_limited_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [semantic_item("p0", Some("Finally"))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = source(&server)
            .search_outcome(&SearchQuery::new("graphs"))
            .await;

        assert_eq!(
            outcome.waits,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40)
            ]
        );
        match outcome.result {
            ApiResult::Ok(papers) => assert_eq!(papers.len(), 1),
            other => panic!("expected papers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_backoff_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(429))
            .expect(5)
            .mount(&server)
            .await;

        let source = source(&server);
        let outcome = source.search_outcome(&SearchQuery::new("graphs")).await;
        assert!(matches!(outcome.result, ApiResult::RateLimited { attempts: 5 }));
        assert_eq!(outcome.waits.len(), 4);
    }

    #[tokio::test]
    async fn test_rate_limited_search_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let response = source(&server)
            .with_backoff(BackoffPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            })
            .search(&SearchQuery::new("graphs"))
            .await
            .unwrap();
        assert!(response.papers.is_empty());
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [semantic_item("p0", Some("Keyed"))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = source(&server)
            .with_api_key(Some("secret".to_string()))
            .search(&SearchQuery::new("graphs"))
            .await
            .unwrap();
        assert_eq!(response.papers.len(), 1);
    }

    #[tokio::test]
    async fn test_download_saves_open_access_pdf() {
        let server = MockServer::start().await;
        let pdf = common::pdf_with_pages(&["Body"]);
        let mut item = semantic_item("abc", Some("Open paper"));
        item["openAccessPdf"]["url"] = serde_json::Value::from(format!("{}/files/abc.pdf", server.uri()));

        Mock::given(method("GET"))
            .and(path("/paper/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(item))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/abc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf.clone()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let result = source(&server)
            .download(&DownloadRequest::new("abc", &dir))
            .await
            .unwrap();

        assert_eq!(result.bytes, pdf.len() as u64);
        assert!(tmp.path().join("abc.pdf").exists());
    }
}

#[cfg(feature = "source-biorxiv")]
mod biorxiv {
    use super::*;
    use common::biorxiv_item;
    use paper_harvest::sources::{BiorxivSource, PAGE_SIZE};
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(range: std::ops::Range<usize>) -> serde_json::Value {
        serde_json::json!({
            "messages": [{ "status": "ok" }],
            "collection": range.map(biorxiv_item).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_search_walks_pages_until_max_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/biorxiv/\d{4}-\d{2}-\d{2}/\d{4}-\d{2}-\d{2}/0$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0..PAGE_SIZE)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/biorxiv/\d{4}-\d{2}-\d{2}/\d{4}-\d{2}-\d{2}/100$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(PAGE_SIZE..2 * PAGE_SIZE)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = BiorxivSource::new()
            .unwrap()
            .with_endpoints(server.uri(), server.uri());
        let response = source
            .search(&SearchQuery::new("Neuroscience").max_results(150))
            .await
            .unwrap();

        assert_eq!(response.papers.len(), 150);
        assert_eq!(response.papers[0].paper_id, "10.1101/2024.01.000");
        assert_eq!(response.papers[149].paper_id, "10.1101/2024.01.149");
    }

    #[tokio::test]
    async fn test_short_page_stops_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/0$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0..12)))
            .expect(1)
            .mount(&server)
            .await;

        let source = BiorxivSource::new()
            .unwrap()
            .with_endpoints(server.uri(), server.uri());
        let response = source
            .search(&SearchQuery::new("genomics").max_results(50))
            .await
            .unwrap();
        assert_eq!(response.papers.len(), 12);
    }

    #[tokio::test]
    async fn test_server_errors_yield_empty_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = BiorxivSource::new()
            .unwrap()
            .with_endpoints(server.uri(), server.uri());
        let response = source
            .search(&SearchQuery::new("genomics").max_results(5))
            .await
            .unwrap();
        assert!(response.papers.is_empty());
    }
}

#[cfg(feature = "source-sci_hub")]
mod sci_hub {
    use super::*;
    use paper_harvest::sources::SciHubSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOI: &str = "10.1000/xyz";

    async fn working_mirror(pdf: Vec<u8>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", DOI)))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div id="article"><iframe src="/files/xyz.pdf"></iframe></div></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/xyz.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf))
            .mount(&server)
            .await;
        server
    }

    async fn broken_mirror(expected_hits: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(expected_hits)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_download_rotates_to_working_mirror_and_remembers_it() {
        // The broken mirrors are only tried by the first download
        let first = broken_mirror(1).await;
        let second = broken_mirror(1).await;
        let good = working_mirror(common::pdf_with_pages(&["Sci-Hub body"])).await;

        let source = SciHubSource::new()
            .unwrap()
            .with_mirrors([first.uri(), second.uri(), good.uri()]);
        assert_eq!(source.mirrors().await.len(), 3);

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();

        let result = source
            .download(&DownloadRequest::new(DOI, &dir))
            .await
            .unwrap();
        assert!(result.bytes > 0);
        assert_eq!(source.current_mirror_index(), 2);
        assert!(tmp.path().join("10.1000_xyz.pdf").exists());

        source
            .download(&DownloadRequest::new(DOI, &dir))
            .await
            .unwrap();
        assert_eq!(source.current_mirror_index(), 2);
    }

    #[tokio::test]
    async fn test_all_mirrors_failing_is_exhausted() {
        let first = broken_mirror(1).await;
        let second = broken_mirror(1).await;
        let source = SciHubSource::new()
            .unwrap()
            .with_mirrors([first.uri(), second.uri()]);

        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .download(&DownloadRequest::new(DOI, tmp.path().to_string_lossy()))
            .await
            .unwrap_err();
        assert!(matches!(err, paper_harvest::SourceError::Exhausted(_)));
        assert_eq!(source.current_mirror_index(), 0);
    }

    #[tokio::test]
    async fn test_read_removes_file_it_downloaded() {
        let good = working_mirror(common::pdf_with_pages(&["Transient text"])).await;
        let source = SciHubSource::new().unwrap().with_mirrors([good.uri()]);

        let tmp = tempfile::tempdir().unwrap();
        let request = ReadRequest::new(DOI, tmp.path().to_string_lossy());

        let result = source.read(&request).await.unwrap();
        assert!(result.text.contains("Transient text"));
        assert!(!request.pdf_path().exists());
    }

    #[tokio::test]
    async fn test_read_of_unparseable_download_is_empty_and_cleaned_up() {
        let good = working_mirror(b"<html>Access denied</html>".to_vec()).await;
        let source = SciHubSource::new().unwrap().with_mirrors([good.uri()]);

        let tmp = tempfile::tempdir().unwrap();
        let request = ReadRequest::new(DOI, tmp.path().to_string_lossy());

        let result = source.read(&request).await.unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.pages, None);
        assert!(!request.pdf_path().exists());
    }

    #[tokio::test]
    async fn test_read_keeps_existing_file() {
        let source = SciHubSource::new()
            .unwrap()
            .with_mirrors(Vec::<String>::new());

        let tmp = tempfile::tempdir().unwrap();
        let request = ReadRequest::new(DOI, tmp.path().to_string_lossy());
        std::fs::write(request.pdf_path(), common::pdf_with_pages(&["Cached copy"])).unwrap();

        let result = source.read(&request).await.unwrap();
        assert!(result.text.contains("Cached copy"));
        assert!(request.pdf_path().exists());
    }
}

#[cfg(feature = "source-iacr")]
mod iacr {
    use super::*;
    use paper_harvest::sources::IacrSource;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_entry(id: &str, title: &str) -> String {
        format!(
            r#"<div class="mb-4">
  <div class="d-flex">
    <a class="paperlink" href="/{id}">{id}</a>
    <a href="/{id}.pdf">(PDF)</a>
    <small class="ms-auto">Last updated: 2024-03-01</small>
  </div>
  <div class="ms-md-4">
    <strong>{title}</strong>
    <span class="fst-italic">Alice Smith, Bob Jones</span>
    <small class="badge">Foundations</small>
    <p class="search-abstract">Compact abstract.</p>
  </div>
</div>"#
        )
    }

    fn detail_page(title: &str) -> String {
        format!(
            r#"<html><body>
<h3 class="mb-3">{title}</h3>
<p class="fst-italic">Alice Smith and Bob Jones</p>
<p style="white-space: pre-wrap;">Full abstract from the detail page.</p>
<div>
History
2024-03-01: last of 2 revisions
2024-02-10: received
Short URL
</div>
</body></html>"#
        )
    }

    async fn server_with_three_papers() -> MockServer {
        let server = MockServer::start().await;
        let ids = ["2024/101", "2024/102", "2024/103"];
        let body = format!(
            "<html><body>{}</body></html>",
            ids.iter()
                .map(|id| search_entry(id, &format!("Paper {}", id)))
                .collect::<String>()
        );
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "zero knowledge"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        // One detail page is missing; its search record is kept instead
        for id in &ids[..2] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", id)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(detail_page(&format!("Paper {}", id))),
                )
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/2024/103"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_detailed_search_returns_same_count_as_compact() {
        let server = server_with_three_papers().await;
        let source = IacrSource::new().unwrap().with_base_url(server.uri());

        let compact = source
            .search(&SearchQuery::new("zero knowledge").fetch_details(false))
            .await
            .unwrap();
        let detailed = source
            .search(&SearchQuery::new("zero knowledge").fetch_details(true))
            .await
            .unwrap();

        assert_eq!(compact.papers.len(), 3);
        assert_eq!(detailed.papers.len(), compact.papers.len());

        assert_eq!(compact.papers[0].r#abstract, "Compact abstract.");
        assert_eq!(
            detailed.papers[0].r#abstract,
            "Full abstract from the detail page."
        );
        assert_eq!(detailed.papers[0].categories, vec!["Foundations"]);
        // Fallback keeps the compact record
        assert_eq!(detailed.papers[2].r#abstract, "Compact abstract.");
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let server = server_with_three_papers().await;
        let source = IacrSource::new().unwrap().with_base_url(server.uri());

        let response = source
            .search(
                &SearchQuery::new("zero knowledge")
                    .max_results(2)
                    .fetch_details(false),
            )
            .await
            .unwrap();
        assert_eq!(response.papers.len(), 2);
    }

    #[tokio::test]
    async fn test_read_prefixes_metadata_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/101"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Readable")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2024/101.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(common::pdf_with_pages(&["First page", "Second page"])),
            )
            .mount(&server)
            .await;

        let source = IacrSource::new().unwrap().with_base_url(server.uri());
        let tmp = tempfile::tempdir().unwrap();
        let result = source
            .read(&ReadRequest::new("2024/101", tmp.path().to_string_lossy()))
            .await
            .unwrap();

        assert!(result.text.starts_with("Title: Readable\n"));
        assert!(result.text.contains(&"=".repeat(80)));
        assert!(result.text.contains("First page"));
        assert!(tmp.path().join("2024_101.pdf").exists());
    }

    #[tokio::test]
    async fn test_download_missing_pdf_is_not_found_and_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/404.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = IacrSource::new().unwrap().with_base_url(server.uri());
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .download(&DownloadRequest::new("2024/404", tmp.path().to_string_lossy()))
            .await
            .unwrap_err();

        assert!(matches!(err, paper_harvest::SourceError::NotFound(_)));
        assert!(!tmp.path().join("2024_404.pdf").exists());
    }
}

#[cfg(feature = "source-google_scholar")]
mod google_scholar {
    use super::*;
    use paper_harvest::sources::GoogleScholarSource;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result(title: &str) -> String {
        format!(
            r#"<div class="gs_r gs_or gs_scl"><div class="gs_ri">
<h3 class="gs_rt"><a href="https://example.org/{slug}">{title}</a></h3>
<div class="gs_a">A Author, B Author - Journal, 2019 - example.org</div>
<div class="gs_rs">Snippet.</div>
</div></div>"#,
            slug = title.to_lowercase().replace(' ', "-"),
        )
    }

    #[tokio::test]
    async fn test_search_stops_when_results_run_out() {
        let server = MockServer::start().await;
        let first_page = format!(
            "<html><body>{}{}{}</body></html>",
            result("First result"),
            result("Second result"),
            result("Third result")
        );
        Mock::given(method("GET"))
            .and(path("/scholar"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(first_page))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/scholar"))
            .and(query_param("start", "5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>No more</body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = GoogleScholarSource::new()
            .unwrap()
            .with_search_url(format!("{}/scholar", server.uri()))
            .with_delay_range(Duration::ZERO, Duration::ZERO);
        let response = source
            .search(&SearchQuery::new("transformers").max_results(5))
            .await
            .unwrap();

        assert_eq!(response.papers.len(), 3);
        assert!(response.papers.iter().all(|p| p.paper_id.starts_with("gs_")));
        assert_eq!(response.papers[0].url, "https://example.org/first-result");
    }

    #[tokio::test]
    async fn test_blocked_response_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = GoogleScholarSource::new()
            .unwrap()
            .with_search_url(format!("{}/scholar", server.uri()))
            .with_delay_range(Duration::ZERO, Duration::ZERO);
        let response = source
            .search(&SearchQuery::new("transformers"))
            .await
            .unwrap();
        assert!(response.papers.is_empty());

        let err = source
            .download(&DownloadRequest::new("gs_abc", "/tmp"))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
