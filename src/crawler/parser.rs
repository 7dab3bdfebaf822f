//! HTML parser for extracting crawl tasks and page metadata
//!
//! This module turns a fetched HTML page into:
//! - Page tasks to crawl (follow-links, plus the next listing page)
//! - File tasks to download, each carrying the page context
//! - The page's own title and keywords

use crate::crawler::job::{TaskKind, UrlTask};
use crate::crawler::rules::{Link, SiteRules};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Title and keyword hints for a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub title: String,
    pub keywords: BTreeSet<String>,
}

impl PageContext {
    fn is_empty(&self) -> bool {
        self.title.is_empty() && self.keywords.is_empty()
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Pages to crawl, the next listing page last
    pub follow: Vec<UrlTask>,

    /// Documents to download
    pub files: Vec<UrlTask>,

    /// The page's own title and keywords, if it has any
    pub article: Option<PageContext>,
}

/// Parses HTML content into child tasks of `parent`
///
/// Child tasks sit one level deeper than the parent. Each file task carries a
/// context whose title is the link text, falling back to the page title.
/// Pagination is not followed here: the next listing page is just another
/// follow task, so a site is walked breadth-first through the frontier.
///
/// Markup that cannot be made sense of produces empty lists, never an error.
///
/// # Example
///
/// ```no_run
/// use wsf_scraper::crawler::{parse_page, GovSiteRules, UrlTask};
/// use url::Url;
///
/// let base = Url::parse("https://www.gov.uk/government/policies").unwrap();
/// let parent = UrlTask::seed(base.clone(), uuid::Uuid::new_v4());
/// let html = r#"<li class="document"><a href="/government/policies/health">Health</a></li>"#;
/// let parsed = parse_page(html, &base, &GovSiteRules::new().unwrap(), &parent);
/// assert_eq!(parsed.follow.len(), 1);
/// ```
pub fn parse_page(html: &str, base_url: &Url, rules: &dyn SiteRules, parent: &UrlTask) -> ParsedPage {
    let document = Html::parse_document(html);

    let page = PageContext {
        title: extract_title(&document).unwrap_or_default(),
        keywords: extract_keywords(&document),
    };

    let links = rules.extract_links(&document, base_url);

    let mut follow: Vec<UrlTask> = links
        .follow
        .into_iter()
        .map(|link| parent.child(link.url, TaskKind::Page, None))
        .collect();

    if let Some(next) = links.next {
        follow.push(parent.child(next.url, TaskKind::Page, None));
    }

    let files = links
        .files
        .into_iter()
        .map(|link| {
            let context = file_context(&link, &page);
            parent.child(link.url, TaskKind::File, Some(context))
        })
        .collect();

    ParsedPage {
        follow,
        files,
        article: (!page.is_empty()).then_some(page),
    }
}

fn file_context(link: &Link, page: &PageContext) -> PageContext {
    let title = if link.text.is_empty() {
        page.title.clone()
    } else {
        link.text.clone()
    };

    PageContext {
        title,
        keywords: page.keywords.clone(),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects comma-separated `<meta name="keywords">` values
fn extract_keywords(document: &Html) -> BTreeSet<String> {
    let Ok(meta_selector) = Selector::parse("meta[name][content]") else {
        return BTreeSet::new();
    };

    document
        .select(&meta_selector)
        .filter(|element| {
            element
                .value()
                .attr("name")
                .is_some_and(|name| name.eq_ignore_ascii_case("keywords"))
        })
        .filter_map(|element| element.value().attr("content"))
        .flat_map(|content| content.split(','))
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}
