use serde::Deserialize;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Entity id the crawl starts from
    #[serde(rename = "seed-id")]
    pub seed_id: String,

    /// Maximum discovery depth from the seed entity
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent worker tasks (also the session pool size)
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Number of collection items per page on the target site
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Lower bound of the randomized inter-page delay (milliseconds)
    #[serde(rename = "rate-limit-min-ms")]
    pub rate_limit_min_ms: u64,

    /// Upper bound of the randomized inter-page delay (milliseconds)
    #[serde(rename = "rate-limit-max-ms")]
    pub rate_limit_max_ms: u64,
}

/// Target site URL templates and identification
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Login page URL; fetches redirected here trigger re-authentication
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Contacts page template, `{id}` is replaced with the entity id
    #[serde(rename = "contacts-url-template")]
    pub contacts_url_template: String,

    /// Collection page template, `{id}` and `{start}` are replaced with the
    /// entity id and the paging offset
    #[serde(rename = "collection-url-template")]
    pub collection_url_template: String,

    /// User-Agent header sent on every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl SiteConfig {
    /// Expands the contacts page URL for an entity
    pub fn contacts_url(&self, entity_id: &str) -> String {
        self.contacts_url_template.replace("{id}", entity_id)
    }

    /// Expands the collection page URL for an entity at a paging offset
    pub fn collection_url(&self, entity_id: &str, start: u32) -> String {
        self.collection_url_template
            .replace("{id}", entity_id)
            .replace("{start}", &start.to_string())
    }
}

/// Login credentials for the target site
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub email: String,
    pub password: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path the JSON result file is written to
    #[serde(rename = "results-path")]
    pub results_path: String,
}
