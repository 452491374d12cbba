//! HTML extraction collaborator
//!
//! The crawl core never looks at markup directly; it consumes the structured
//! results of a [`PageExtractor`]. The selector definitions for the target
//! site live here, in the default [`SiteExtractor`] implementation.

use crate::registry::CollectionItem;
use scraper::{Html, Selector};

/// A (neighbor id, display name) pair discovered on a contacts page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub id: String,
    pub display_name: String,
}

/// Hidden form tokens required by the login POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Value of the hidden `source` input
    pub source: String,
    /// Value of the hidden `redir` input (post-login redirect target)
    pub redirect: String,
}

/// Captcha challenge metadata embedded in a login page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// URL of the captcha image to show the human
    pub image_url: String,
    /// Session-scoped captcha identifier submitted with the solution
    pub challenge_id: String,
}

/// Structured extraction from raw response bodies
///
/// Implementations must be cheap to call repeatedly; the crawl core treats
/// all results as opaque.
pub trait PageExtractor: Send + Sync {
    /// Extracts (neighbor id, display name) pairs from a contacts page
    fn neighbors(&self, html: &str) -> Vec<Neighbor>;

    /// Extracts collection item records from one collection page, in page
    /// order
    fn collection_items(&self, html: &str) -> Vec<CollectionItem>;

    /// Extracts the hidden login form tokens, if present
    fn login_form(&self, html: &str) -> Option<LoginForm>;

    /// Extracts captcha challenge metadata, if the page embeds one
    fn challenge(&self, html: &str) -> Option<Challenge>;
}

/// Default extractor for the target site's markup
///
/// Contacts are `<dd><a href=".../people/{id}/">{name}</a></dd>` entries;
/// collection rows are `<a href=".../subject/{item}/">{title}</a>` links
/// paired positionally with `<span class="intro">` notes; the login form
/// carries `source`, `redir` and optional `captcha-id` hidden inputs.
#[derive(Debug, Default)]
pub struct SiteExtractor;

impl SiteExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Pulls the path segment following `marker` out of an href
///
/// `segment_after("https://x/people/u2/", "/people/")` yields `u2`.
fn segment_after(href: &str, marker: &str) -> Option<String> {
    let idx = href.find(marker)?;
    let rest = &href[idx + marker.len()..];
    let id = rest.split('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Reads the `value` attribute of the first element matching `selector`
fn attr_value(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.to_string())
}

impl PageExtractor for SiteExtractor {
    fn neighbors(&self, html: &str) -> Vec<Neighbor> {
        let document = Html::parse_document(html);
        let mut neighbors = Vec::new();

        if let Ok(selector) = Selector::parse(r#"dd > a[href*="/people/"]"#) {
            for element in document.select(&selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                let Some(id) = segment_after(href, "/people/") else {
                    continue;
                };
                let display_name = element.text().collect::<String>().trim().to_string();
                neighbors.push(Neighbor { id, display_name });
            }
        }

        neighbors
    }

    fn collection_items(&self, html: &str) -> Vec<CollectionItem> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        let Ok(item_selector) = Selector::parse(r#"a[href*="/subject/"]"#) else {
            return items;
        };
        let notes: Vec<String> = match Selector::parse("span.intro") {
            Ok(selector) => document
                .select(&selector)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };

        for (i, element) in document.select(&item_selector).enumerate() {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(item_id) = segment_after(href, "/subject/") else {
                continue;
            };
            let title = element.text().collect::<String>().trim().to_string();
            // Notes are paired by position; a missing note is empty, as on
            // the source page
            let note = notes.get(i).cloned().unwrap_or_default();
            items.push(CollectionItem {
                item_id,
                title,
                note,
            });
        }

        items
    }

    fn login_form(&self, html: &str) -> Option<LoginForm> {
        let document = Html::parse_document(html);
        let source = attr_value(&document, r#"input[name="source"]"#, "value")?;
        let redirect = attr_value(&document, r#"input[name="redir"]"#, "value")?;
        Some(LoginForm { source, redirect })
    }

    fn challenge(&self, html: &str) -> Option<Challenge> {
        let document = Html::parse_document(html);
        let image_url = attr_value(&document, "img#captcha_image", "src")?;
        let challenge_id = attr_value(&document, r#"input[name="captcha-id"]"#, "value")?;
        Some(Challenge {
            image_url,
            challenge_id,
        })
    }
}
