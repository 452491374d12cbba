//! Authenticated HTTP sessions and the fixed-size session pool
//!
//! A [`Session`] owns one HTTP client with its own cookie jar. Sessions are
//! owned exclusively by the [`SessionPool`]; workers check one out per task
//! and the RAII guard returns it, so no two workers ever touch the same
//! session concurrently and an erroring worker can never leak one.

mod pool;

pub use pool::{PooledSession, SessionPool};

use crate::{CrawlError, Result};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Response};
use std::time::Duration;

/// One authenticated HTTP conversation context
///
/// Mutated in place (Referer updates, re-authentication) while checked out
/// of the pool; never shared between two concurrent acquirers.
#[derive(Debug)]
pub struct Session {
    client: Client,
    referer: String,
    authenticated: bool,
}

impl Session {
    /// Builds a fresh session with its own cookie store
    ///
    /// The initial Referer is the login URL; login updates it to the
    /// post-login URL and fetches keep it pointing at the last page seen.
    pub fn new(user_agent: &str, login_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Upgrade-Insecure-Requests",
            HeaderValue::from_static("1"),
        );

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|source| CrawlError::Http {
                url: login_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            referer: login_url.to_string(),
            authenticated: false,
        })
    }

    /// Issues a GET with the session's current Referer
    ///
    /// Redirects are followed; callers inspect the final URL to detect a
    /// bounce to the login page.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.client
            .get(url)
            .header(REFERER, &self.referer)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// Issues a form POST with the session's current Referer
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response> {
        self.client
            .post(url)
            .header(REFERER, &self.referer)
            .form(form)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn set_referer(&mut self, url: &str) {
        self.referer = url.to_string();
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }
}
