//! Normalized record shapes produced by the data gateway.

use serde::{Deserialize, Serialize};

/// Academic paper returned by the paper-search capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    /// Submission date formatted as `YYYY-MM-DD` (empty when unknown).
    pub published_date: String,
    pub url: String,
    pub categories: Vec<String>,
}

/// Feed entry that matched the gateway's keyword filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub source_name: String,
    pub published: String,
    pub url: String,
}

/// Repository returned by the repository-search capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub description: String,
    pub stars: u64,
    pub language: String,
    pub updated: String,
    pub url: String,
}

/// A single fetched record tagged with its source family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceRecord {
    Paper(Paper),
    News(NewsItem),
    Repo(Repo),
}

impl SourceRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRecord::Paper(_) => SourceKind::Papers,
            SourceRecord::News(_) => SourceKind::News,
            SourceRecord::Repo(_) => SourceKind::Repos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Papers,
    News,
    Repos,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Papers, SourceKind::News, SourceKind::Repos];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Papers => "papers",
            SourceKind::News => "news",
            SourceKind::Repos => "repos",
        }
    }
}

/// Per-source item counts for one bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub papers: usize,
    pub news: usize,
    pub repos: usize,
}

impl SourceCounts {
    pub fn new(papers: usize, news: usize, repos: usize) -> Self {
        Self {
            papers,
            news,
            repos,
        }
    }

    pub fn get(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Papers => self.papers,
            SourceKind::News => self.news,
            SourceKind::Repos => self.repos,
        }
    }

    pub fn total(&self) -> usize {
        self.papers + self.news + self.repos
    }

    /// Number of source families that produced at least one record.
    pub fn present_kinds(&self) -> usize {
        SourceKind::ALL
            .iter()
            .filter(|kind| self.get(**kind) > 0)
            .count()
    }
}

/// Everything fetched for one task. Sequences keep fetch order and are not
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub search_terms: Vec<String>,
    pub papers: Vec<Paper>,
    pub news: Vec<NewsItem>,
    pub repos: Vec<Repo>,
}

impl ResearchBundle {
    pub fn counts(&self) -> SourceCounts {
        SourceCounts::new(self.papers.len(), self.news.len(), self.repos.len())
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// The first `per_source` records of each family, papers first.
    pub fn preview(&self, per_source: usize) -> Vec<SourceRecord> {
        let papers = self
            .papers
            .iter()
            .take(per_source)
            .cloned()
            .map(SourceRecord::Paper);
        let news = self
            .news
            .iter()
            .take(per_source)
            .cloned()
            .map(SourceRecord::News);
        let repos = self
            .repos
            .iter()
            .take(per_source)
            .cloned()
            .map(SourceRecord::Repo);
        papers.chain(news).chain(repos).collect()
    }
}
