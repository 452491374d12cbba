//! Login handshake and mid-crawl re-authentication
//!
//! The authenticator performs the target site's form login, including the
//! optional human-solved captcha step. The human-input channel is the
//! injectable [`ChallengeSolver`] trait, so the flow is testable with a
//! scripted solver; only the worker that hit the challenge suspends on it.

use crate::config::CredentialsConfig;
use crate::extract::{Challenge, PageExtractor};
use crate::session::Session;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A fetched page body together with its final URL (after redirects)
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

/// Human-input channel for captcha challenges
///
/// `solve` is called with the challenge metadata and suspends the calling
/// worker until a solution string is available.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, challenge: &Challenge) -> Result<String>;
}

/// Performs the login handshake against the target site
pub struct Authenticator {
    login_url: String,
    credentials: CredentialsConfig,
    extractor: Arc<dyn PageExtractor>,
    solver: Arc<dyn ChallengeSolver>,
}

/// Returns true if a fetch was redirected to the login page, meaning the
/// session's authentication has expired
pub fn is_login_redirect(final_url: &str, login_url: &str) -> bool {
    final_url.starts_with(login_url)
}

impl Authenticator {
    pub fn new(
        login_url: &str,
        credentials: CredentialsConfig,
        extractor: Arc<dyn PageExtractor>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Self {
        Self {
            login_url: login_url.to_string(),
            credentials,
            extractor,
            solver,
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Runs the login flow on a session
    ///
    /// `url` overrides the login URL (re-authentication starts from the URL
    /// the fetch was bounced to); `prior` reuses an in-flight response body
    /// as the login page instead of fetching it again.
    ///
    /// Flow: locate the hidden `source`/`redir` tokens (absence is a fatal
    /// [`CrawlError::ProtocolMismatch`] since the login page contract
    /// changed), solve the captcha if one is embedded, POST the form, then
    /// verify the response left the login page. On success the session's
    /// Referer is moved to the post-login URL and its authenticated flag is
    /// set.
    pub async fn login(
        &self,
        session: &mut Session,
        url: Option<&str>,
        prior: Option<FetchedPage>,
    ) -> Result<FetchedPage> {
        let login_url = url.unwrap_or(&self.login_url).to_string();
        tracing::debug!("logging in via {}", login_url);

        let page = match prior {
            Some(page) => page,
            None => {
                let response = session.get(&login_url).await?;
                let final_url = response.url().to_string();
                let body = response.text().await.map_err(|source| CrawlError::Http {
                    url: login_url.clone(),
                    source,
                })?;
                FetchedPage {
                    url: final_url,
                    body,
                }
            }
        };

        let form = self
            .extractor
            .login_form(&page.body)
            .ok_or_else(|| {
                CrawlError::ProtocolMismatch(
                    "login page is missing the source/redir form tokens".to_string(),
                )
            })?;

        if let Some(challenge) = self.extractor.challenge(&page.body) {
            tracing::info!("captcha challenge found, waiting for solution");
            let solution = self.solver.solve(&challenge).await?;
            let fields = [
                ("captcha-id", challenge.challenge_id.as_str()),
                ("captcha-solution", solution.as_str()),
            ];

            let response = self.submit(session, &login_url, &form, &fields).await?;
            return self.finish(session, response).await;
        }

        let response = self.submit(session, &login_url, &form, &[]).await?;
        self.finish(session, response).await
    }

    async fn submit(
        &self,
        session: &mut Session,
        login_url: &str,
        form: &crate::extract::LoginForm,
        extra: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let mut fields: Vec<(&str, &str)> = vec![
            ("form_email", &self.credentials.email),
            ("form_password", &self.credentials.password),
            ("remember", "on"),
            ("source", &form.source),
            ("redir", &form.redirect),
        ];
        fields.extend_from_slice(extra);

        session.post_form(login_url, &fields).await
    }

    async fn finish(
        &self,
        session: &mut Session,
        response: reqwest::Response,
    ) -> Result<FetchedPage> {
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Auth(format!(
                "login POST returned HTTP {}",
                status.as_u16()
            )));
        }

        let final_url = response.url().to_string();
        // Landing back on the login page means the credentials (or the
        // challenge answer) were rejected
        if is_login_redirect(&final_url, &self.login_url) {
            return Err(CrawlError::Auth(
                "credentials rejected, still on the login page".to_string(),
            ));
        }

        let body = response.text().await.map_err(|source| CrawlError::Http {
            url: final_url.clone(),
            source,
        })?;

        session.set_referer(&final_url);
        session.set_authenticated(true);
        tracing::debug!("login succeeded, landed on {}", final_url);

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}
