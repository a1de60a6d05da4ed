use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{PaperSearch, RawPaper};
use crate::EcosystemError;

/// Paper search over the arXiv Atom query API.
#[derive(Clone)]
pub struct ArxivClient {
    client: Client,
    endpoint: String,
}

impl ArxivClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EcosystemError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EcosystemError::Http(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PaperSearch for ArxivClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawPaper>> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", query),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .context("arXiv request failed")?
            .error_for_status()
            .context("arXiv returned an error status")?;

        let body = response.text().await.context("failed to read arXiv body")?;
        parse_atom(&body)
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: String,
}

fn parse_atom(body: &str) -> Result<Vec<RawPaper>> {
    let feed: AtomFeed = quick_xml::de::from_str(body).context("malformed arXiv Atom feed")?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| RawPaper {
            title: entry.title,
            authors: entry.authors.into_iter().map(|author| author.name).collect(),
            summary: entry.summary,
            published: entry
                .published
                .as_deref()
                .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            url: entry.id,
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=quantum</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-05-10T00:00:00-04:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2405.00002v1</id>
    <updated>2024-05-09T17:59:59Z</updated>
    <published>2024-05-09T17:59:59Z</published>
    <title>Error Correction for
      Noisy Qubits</title>
    <summary>We study surface codes.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2405.00002v1" rel="alternate" type="text/html"/>
    <category term="quant-ph" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.ET" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2405.00001v1</id>
    <updated>2024-05-08T10:00:00Z</updated>
    <published>2024-05-08T10:00:00Z</published>
    <title>Benchmarking Annealers</title>
    <summary>Annealing results.</summary>
    <author><name>Grace Hopper</name></author>
    <category term="quant-ph" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_authors_and_categories() {
        let papers = parse_atom(ATOM).expect("feed parses");
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(papers[0].categories, vec!["quant-ph", "cs.ET"]);
        assert_eq!(papers[0].url, "http://arxiv.org/abs/2405.00002v1");
        assert!(papers[0].published.is_some());
    }

    #[test]
    fn empty_feed_has_no_papers() {
        let papers = parse_atom(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#)
            .expect("feed parses");
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn requests_newest_submissions_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "quantum"))
            .and(query_param("sortBy", "submittedDate"))
            .and(query_param("sortOrder", "descending"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATOM))
            .mount(&server)
            .await;

        let client = ArxivClient::new(format!("{}/api/query", server.uri()), Duration::from_secs(5))
            .expect("client builds");
        let papers = client.search("quantum", 5).await.expect("search succeeds");
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ArxivClient::new(server.uri(), Duration::from_secs(5)).expect("client builds");
        assert!(client.search("quantum", 5).await.is_err());
    }
}
