//! Search → CSV pipeline.
//!
//! One run validates the request, performs the search and writes the file,
//! strictly in that order. Any error ends the run before the next stage.

use crate::config::Config;
use crate::error::Result;
use crate::serpapi::{SearchRequest, SerpApiClient};
use crate::writer::ResultWriter;
use std::path::PathBuf;
use tracing::info;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// File that was written
    pub path: PathBuf,
    /// Data rows in the file (header excluded)
    pub rows: usize,
}

/// Run the pipeline for `query`.
///
/// # Errors
///
/// * `ScholarError::Config` before any network activity if the request is invalid
/// * `ScholarError::Fetch` if the search fails; nothing is written
/// * `ScholarError::Write` if the file cannot be written
pub async fn run(
    config: &Config,
    client: &SerpApiClient,
    writer: &ResultWriter,
    query: &str,
) -> Result<RunReport> {
    let request = SearchRequest::new(query, config.result_count, &config.api_key)?;

    let results = client.fetch_with_retry(&request, &config.retry).await?;
    info!(query = request.query(), count = results.len(), "Fetched results");

    let path = writer.write(&results, request.query())?;

    Ok(RunReport {
        path,
        rows: results.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ScholarError};
    use mockito::Matcher;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn entries(dir: &std::path::Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    struct Harness {
        server: mockito::ServerGuard,
        out: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            Self {
                server: mockito::Server::new_async().await,
                out: TempDir::new().expect("temp dir"),
            }
        }

        fn config(&self, api_key: &str) -> Config {
            Config::new(api_key)
                .with_endpoint(format!("{}/search", self.server.url()))
                .with_output_dir(self.out.path().join("research_results"))
                .with_result_count(10)
        }

        async fn run(&self, config: &Config, query: &str) -> Result<RunReport> {
            let client = SerpApiClient::from_config(config).expect("client");
            let writer = ResultWriter::new(&config.output_dir);
            run(config, &client, &writer, query).await
        }
    }

    #[tokio::test]
    async fn test_three_results_written_in_order() {
        let mut h = Harness::new().await;
        let body = json!({
            "organic_results": [
                { "title": "First", "link": "https://1.example", "snippet": "one",
                  "publication_info": { "authors": [{ "name": "A One" }] } },
                { "title": "Second", "link": "https://2.example", "snippet": "two",
                  "publication_info": { "authors": [{ "name": "B Two" }, { "name": "C Three" }] } },
                { "title": "Third", "link": "https://3.example", "snippet": "three",
                  "publication_info": { "authors": [{ "name": "D Four" }] } }
            ]
        });
        let mock = h
            .server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "machine learning".into()))
            .with_status(200)
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let config = h.config("test-key");
        let report = h.run(&config, "machine learning").await.expect("run");
        mock.assert_async().await;

        assert_eq!(report.rows, 3);
        let name = report
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert!(name.starts_with("research_results_machine_learning_"));
        assert!(name.ends_with(".csv"));

        let mut rdr = csv::Reader::from_path(&report.path).expect("open");
        let titles: Vec<String> = rdr
            .records()
            .map(|r| r.expect("record")[1].to_string())
            .collect();
        assert_eq!(titles, ["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_no_results_is_success() {
        let mut h = Harness::new().await;
        let _mock = h
            .server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"organic_results": []}"#)
            .create_async()
            .await;

        let config = h.config("test-key");
        let report = h.run(&config, "zzzzznoresults").await.expect("run");

        assert_eq!(report.rows, 0);
        let content = fs::read_to_string(&report.path).expect("read");
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let mut h = Harness::new().await;
        let mock = h
            .server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let config = h.config("");
        let err = h.run(&config, "graphs").await.expect_err("no key");

        assert!(matches!(err, ScholarError::Config(_)));
        mock.assert_async().await;
        assert_eq!(entries(h.out.path()), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_writes_nothing() {
        let mut h = Harness::new().await;
        let _mock = h
            .server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": "Invalid API key. Your API key should be here: https://serpapi.com/manage-api-key"}"#)
            .create_async()
            .await;

        let config = h.config("wrong-key");
        let err = h.run(&config, "graphs").await.expect_err("unauthorized");

        assert!(matches!(
            err,
            ScholarError::Fetch(FetchError::Auth { status: 401, .. })
        ));
        assert_eq!(entries(h.out.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_config_error() {
        let h = Harness::new().await;
        let config = h.config("test-key");
        let err = h.run(&config, "   ").await.expect_err("empty query");
        assert!(matches!(err, ScholarError::Config(_)));
    }
}
