//! Multi-source data gathering.
//!
//! The gateway fronts three independent fetch capabilities (paper search, news
//! feeds, repository search), normalizes what they return, and never lets a
//! single source failure escape: a failing or slow source contributes nothing
//! and is logged.

mod arxiv;
mod feeds;
mod github;
mod terms;

pub use arxiv::ArxivClient;
pub use feeds::HttpFeedReader;
pub use github::GithubClient;
pub use terms::{TERM_RULES, TermRule, derive_search_terms};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, FeedSource};
use crate::sources::{NewsItem, Paper, Repo, ResearchBundle};
use crate::EcosystemError;

/// Paper abstracts are cut to this many chars. The `...` marker is appended
/// only when something was actually cut; a short abstract is kept verbatim.
pub const PAPER_SUMMARY_LIMIT: usize = 500;
pub const NEWS_DESCRIPTION_LIMIT: usize = 300;
const ELLIPSIS: &str = "...";

/// Paper as returned by a paper-search capability, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPaper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub url: String,
    pub categories: Vec<String>,
}

/// Entry as returned by a feed capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: String,
}

/// Repository search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoQuery {
    pub query: String,
    pub sort: String,
    pub order: String,
    pub per_page: usize,
}

impl RepoQuery {
    /// Most recently updated first.
    pub fn recently_updated(query: impl Into<String>, per_page: usize) -> Self {
        Self {
            query: query.into(),
            sort: "updated".to_string(),
            order: "desc".to_string(),
            per_page,
        }
    }
}

/// Repository as returned by a repository-search capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRepo {
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub language: Option<String>,
    pub updated_at: String,
    pub html_url: String,
}

#[async_trait]
pub trait PaperSearch: Send + Sync {
    /// Newest submissions first.
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<RawPaper>>;
}

#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<FeedEntry>>;
}

#[async_trait]
pub trait RepoSearch: Send + Sync {
    /// A non-success response is an `Err`.
    async fn search(&self, query: &RepoQuery) -> anyhow::Result<Vec<RawRepo>>;
}

/// Tunables for one gateway instance.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub feeds: Vec<FeedSource>,
    pub papers_per_term: usize,
    pub repo_limit: usize,
    /// Applied to every individual capability call.
    pub timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let sources = crate::config::SourcesConfig::default();
        Self {
            feeds: sources.feeds.clone(),
            papers_per_term: sources.papers_per_term,
            repo_limit: sources.repo_limit,
            timeout: sources.timeout(),
        }
    }
}

pub struct DataSourceGateway {
    papers: Arc<dyn PaperSearch>,
    feeds: Arc<dyn FeedReader>,
    repos: Arc<dyn RepoSearch>,
    settings: GatewaySettings,
}

impl DataSourceGateway {
    pub fn new(
        papers: Arc<dyn PaperSearch>,
        feeds: Arc<dyn FeedReader>,
        repos: Arc<dyn RepoSearch>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            papers,
            feeds,
            repos,
            settings,
        }
    }

    /// Build the gateway over the public HTTP sources named in `config`.
    pub fn from_config(config: &Config) -> Result<Self, EcosystemError> {
        let sources = &config.sources;
        let timeout = sources.timeout();

        let papers = ArxivClient::new(&sources.arxiv_url, timeout)?;
        let feeds = HttpFeedReader::new(timeout)?;
        let repos = GithubClient::new(&sources.github_url, config.github_token(), timeout)?;

        Ok(Self::new(
            Arc::new(papers),
            Arc::new(feeds),
            Arc::new(repos),
            GatewaySettings {
                feeds: sources.feeds.clone(),
                papers_per_term: sources.papers_per_term,
                repo_limit: sources.repo_limit,
                timeout,
            },
        ))
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Papers for `term`, newest submission first. Failures yield an empty list.
    pub async fn search_papers(&self, term: &str, limit: usize) -> Vec<Paper> {
        let Some(mut raw) = self
            .bounded("papers", self.papers.search(term, limit))
            .await
        else {
            return Vec::new();
        };

        // stable: equal dates keep provider order
        raw.sort_by(|a, b| b.published.cmp(&a.published));

        let papers: Vec<Paper> = raw.into_iter().map(normalize_paper).collect();
        info!(term, count = papers.len(), "retrieved papers");
        papers
    }

    /// Scan every configured feed and keep entries mentioning any word of `term`.
    pub async fn search_news(&self, term: &str) -> Vec<NewsItem> {
        let keywords = news_keywords(term);
        let mut articles = Vec::new();

        for feed in &self.settings.feeds {
            let Some(entries) = self.bounded(&feed.name, self.feeds.fetch(&feed.url)).await else {
                continue;
            };

            articles.extend(
                entries
                    .into_iter()
                    .filter(|entry| entry_matches(entry, &keywords))
                    .map(|entry| normalize_news(entry, &feed.name)),
            );
        }

        info!(term, count = articles.len(), "retrieved news articles");
        articles
    }

    /// Repositories for `term`, most recently updated first.
    pub async fn search_repos(&self, term: &str, limit: usize) -> Vec<Repo> {
        let query = RepoQuery::recently_updated(term, limit);
        let repos: Vec<Repo> = match self.bounded("repos", self.repos.search(&query)).await {
            Some(raw) => raw.into_iter().map(normalize_repo).collect(),
            None => Vec::new(),
        };
        info!(term, count = repos.len(), "retrieved repositories");
        repos
    }

    /// Gather a bundle for a task. The three source families run concurrently;
    /// papers are fetched for every derived term, news and repositories for the
    /// first term only.
    #[instrument(name = "gateway.gather", skip(self, description))]
    pub async fn gather(&self, title: &str, description: &str) -> ResearchBundle {
        let search_terms = derive_search_terms(title, description);
        let Some(primary) = search_terms.first().cloned() else {
            warn!(title, "no search terms derived; returning empty bundle");
            return ResearchBundle::default();
        };

        let papers = async {
            let mut papers = Vec::new();
            for term in &search_terms {
                papers.extend(self.search_papers(term, self.settings.papers_per_term).await);
            }
            papers
        };
        let news = self.search_news(&primary);
        let repos = self.search_repos(&primary, self.settings.repo_limit);

        let (papers, news, repos) = tokio::join!(papers, news, repos);

        let bundle = ResearchBundle {
            search_terms,
            papers,
            news,
            repos,
        };
        debug!(counts = ?bundle.counts(), "bundle gathered");
        bundle
    }

    /// Run one capability call under the per-call timeout. Errors and timeouts
    /// are logged and collapse to `None`.
    async fn bounded<T, F>(&self, source: &str, call: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(source, error = %err, "source fetch failed");
                None
            }
            Err(_) => {
                warn!(
                    source,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "source fetch timed out"
                );
                None
            }
        }
    }
}

/// Lowercased whitespace-split tokens of the query.
fn news_keywords(term: &str) -> Vec<String> {
    term.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn entry_matches(entry: &FeedEntry, keywords: &[String]) -> bool {
    let content = format!("{} {}", entry.title, entry.summary).to_lowercase();
    keywords.iter().any(|keyword| content.contains(keyword.as_str()))
}

fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_paper(raw: RawPaper) -> Paper {
    let (mut summary, truncated) = truncate_chars(&collapse_whitespace(&raw.summary), PAPER_SUMMARY_LIMIT);
    if truncated {
        summary.push_str(ELLIPSIS);
    }

    Paper {
        title: collapse_whitespace(&raw.title),
        authors: raw.authors,
        summary,
        published_date: raw
            .published
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        url: raw.url,
        categories: raw.categories,
    }
}

fn normalize_news(entry: FeedEntry, source_name: &str) -> NewsItem {
    let (description, _) = truncate_chars(&entry.summary, NEWS_DESCRIPTION_LIMIT);
    NewsItem {
        title: entry.title,
        description,
        source_name: source_name.to_string(),
        published: entry.published,
        url: entry.link,
    }
}

fn normalize_repo(raw: RawRepo) -> Repo {
    Repo {
        name: raw.full_name,
        description: raw.description.unwrap_or_default(),
        stars: raw.stargazers_count,
        language: raw.language.unwrap_or_default(),
        updated: raw.updated_at,
        url: raw.html_url,
    }
}
