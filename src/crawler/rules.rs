//! Per-site link extraction rules and the spider registry
//!
//! A spider is a name, its seed URLs and one rule-set. Rule-sets form a small
//! closed family behind the [`SiteRules`] trait; the spider name picks one
//! when a job starts.

use crate::config::{RulesKind, SpiderConfig};
use crate::url::resolve_link;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

pub const GOV_SPIDER: &str = "gov_uk";
pub const WHO_SPIDER: &str = "who_iris";

const GOV_SEED: &str = "https://www.gov.uk/government/policies";
const GOV_FOLLOW: &str = "li.document a[href]";
const GOV_FILES: &str = ".attachment-details .title a[href]";
const GOV_NEXT: &str = ".pub-c-pagination__item--next a[href]";

const WHO_SEED: &str = "https://apps.who.int/iris/discover";
const WHO_FOLLOW: &str = ".ds-artifact-item a[href]";
const WHO_NEXT: &str = "a.next-page-link[href]";

/// Returns the rule-set a built-in spider name is bound to
pub fn builtin_rules_kind(name: &str) -> Option<RulesKind> {
    match name {
        GOV_SPIDER => Some(RulesKind::Gov),
        WHO_SPIDER => Some(RulesKind::Who),
        _ => None,
    }
}

/// An absolute link with its anchor text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

/// Links a rule-set found on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// Pages to crawl
    pub follow: Vec<Link>,
    /// Documents to download
    pub files: Vec<Link>,
    /// Next listing page, if the page has one
    pub next: Option<Link>,
}

/// Link extraction strategy for one site
pub trait SiteRules: Send + Sync {
    fn kind(&self) -> RulesKind;

    fn extract_links(&self, document: &Html, base_url: &Url) -> ExtractedLinks;
}

/// Selector overrides taken from a `[[spider]]` entry
#[derive(Debug, Clone, Default)]
struct Overrides<'a> {
    follow: Option<&'a str>,
    files: Option<&'a str>,
    next: Option<&'a str>,
}

impl<'a> From<&'a SpiderConfig> for Overrides<'a> {
    fn from(config: &'a SpiderConfig) -> Self {
        Self {
            follow: config.follow_selector.as_deref(),
            files: config.file_selector.as_deref(),
            next: config.next_selector.as_deref(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn parse_optional(selector: Option<&str>) -> Result<Option<Selector>, ConfigError> {
    selector.map(parse_selector).transpose()
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_links(document: &Html, selector: &Selector, base_url: &Url) -> Vec<Link> {
    document
        .select(selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_link(href, base_url)?;
            Some(Link {
                url,
                text: anchor_text(&element),
            })
        })
        .collect()
}

fn select_next(document: &Html, selector: Option<&Selector>, base_url: &Url) -> Option<Link> {
    select_links(document, selector?, base_url).into_iter().next()
}

/// gov.uk policy listings
pub struct GovSiteRules {
    follow: Selector,
    files: Selector,
    next: Selector,
}

impl GovSiteRules {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_overrides(Overrides::default())
    }

    fn with_overrides(overrides: Overrides<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            follow: parse_selector(overrides.follow.unwrap_or(GOV_FOLLOW))?,
            files: parse_selector(overrides.files.unwrap_or(GOV_FILES))?,
            next: parse_selector(overrides.next.unwrap_or(GOV_NEXT))?,
        })
    }
}

impl SiteRules for GovSiteRules {
    fn kind(&self) -> RulesKind {
        RulesKind::Gov
    }

    fn extract_links(&self, document: &Html, base_url: &Url) -> ExtractedLinks {
        ExtractedLinks {
            follow: select_links(document, &self.follow, base_url),
            files: select_links(document, &self.files, base_url),
            next: select_next(document, Some(&self.next), base_url),
        }
    }
}

/// WHO IRIS repository listings
///
/// Item pages are followed; any anchor whose path ends in `.pdf` is a
/// bitstream download, unless a file selector is configured.
pub struct WhoSiteRules {
    follow: Selector,
    files: Option<Selector>,
    anchors: Selector,
    next: Selector,
}

impl WhoSiteRules {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_overrides(Overrides::default())
    }

    fn with_overrides(overrides: Overrides<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            follow: parse_selector(overrides.follow.unwrap_or(WHO_FOLLOW))?,
            files: parse_optional(overrides.files)?,
            anchors: parse_selector("a[href]")?,
            next: parse_selector(overrides.next.unwrap_or(WHO_NEXT))?,
        })
    }
}

impl SiteRules for WhoSiteRules {
    fn kind(&self) -> RulesKind {
        RulesKind::Who
    }

    fn extract_links(&self, document: &Html, base_url: &Url) -> ExtractedLinks {
        let files = match &self.files {
            Some(selector) => select_links(document, selector, base_url),
            None => select_links(document, &self.anchors, base_url)
                .into_iter()
                .filter(|link| link.url.path().to_ascii_lowercase().ends_with(".pdf"))
                .collect(),
        };

        ExtractedLinks {
            follow: select_links(document, &self.follow, base_url),
            files,
            next: select_next(document, Some(&self.next), base_url),
        }
    }
}

/// Rules built entirely from configured selectors
pub struct SelectorRules {
    follow: Option<Selector>,
    files: Option<Selector>,
    next: Option<Selector>,
}

impl SelectorRules {
    pub fn new(
        follow: Option<&str>,
        files: Option<&str>,
        next: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            follow: parse_optional(follow)?,
            files: parse_optional(files)?,
            next: parse_optional(next)?,
        })
    }
}

impl SiteRules for SelectorRules {
    fn kind(&self) -> RulesKind {
        RulesKind::Custom
    }

    fn extract_links(&self, document: &Html, base_url: &Url) -> ExtractedLinks {
        let select = |selector: &Option<Selector>| {
            selector
                .as_ref()
                .map(|s| select_links(document, s, base_url))
                .unwrap_or_default()
        };

        ExtractedLinks {
            follow: select(&self.follow),
            files: select(&self.files),
            next: select_next(document, self.next.as_ref(), base_url),
        }
    }
}

/// A runnable spider: name, seeds and rule-set
#[derive(Clone)]
pub struct SpiderSpec {
    pub name: String,
    pub seeds: Vec<Url>,
    pub rules: Arc<dyn SiteRules>,
}

impl std::fmt::Debug for SpiderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiderSpec")
            .field("name", &self.name)
            .field("seeds", &self.seeds)
            .field("rules", &self.rules.kind())
            .finish()
    }
}

fn parse_seeds(name: &str, seeds: &[String], defaults: &[&str]) -> Result<Vec<Url>, ConfigError> {
    let raw: Vec<&str> = if seeds.is_empty() {
        defaults.to_vec()
    } else {
        seeds.iter().map(String::as_str).collect()
    };

    raw.into_iter()
        .map(|seed| {
            Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("spider '{}' seed '{}': {}", name, seed, e))
            })
        })
        .collect()
}

fn build_spider(
    name: &str,
    kind: RulesKind,
    config: Option<&SpiderConfig>,
) -> Result<SpiderSpec, ConfigError> {
    let overrides = config.map(Overrides::from).unwrap_or_default();
    let seeds = config.map(|c| c.seeds.as_slice()).unwrap_or_default();

    let (rules, seeds): (Arc<dyn SiteRules>, Vec<Url>) = match kind {
        RulesKind::Gov => (
            Arc::new(GovSiteRules::with_overrides(overrides)?),
            parse_seeds(name, seeds, &[GOV_SEED])?,
        ),
        RulesKind::Who => (
            Arc::new(WhoSiteRules::with_overrides(overrides)?),
            parse_seeds(name, seeds, &[WHO_SEED])?,
        ),
        RulesKind::Custom => (
            Arc::new(SelectorRules::new(
                overrides.follow,
                overrides.files,
                overrides.next,
            )?),
            parse_seeds(name, seeds, &[])?,
        ),
    };

    Ok(SpiderSpec {
        name: name.to_string(),
        seeds,
        rules,
    })
}

/// Builds every runnable spider: the built-ins (with any configured
/// overrides) plus the configured custom spiders, keyed by name
pub fn build_spiders(configs: &[SpiderConfig]) -> Result<BTreeMap<String, SpiderSpec>, ConfigError> {
    let mut spiders = BTreeMap::new();

    for (name, kind) in [(GOV_SPIDER, RulesKind::Gov), (WHO_SPIDER, RulesKind::Who)] {
        let config = configs.iter().find(|c| c.name == name);
        spiders.insert(name.to_string(), build_spider(name, kind, config)?);
    }

    for config in configs {
        if builtin_rules_kind(&config.name).is_some() {
            continue;
        }
        let kind = config.rules.unwrap_or(RulesKind::Custom);
        spiders.insert(
            config.name.clone(),
            build_spider(&config.name, kind, Some(config))?,
        );
    }

    Ok(spiders)
}
