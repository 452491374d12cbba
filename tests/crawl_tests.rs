//! Integration tests for the crawl engine
//!
//! These tests use wiremock to stand in for the target site: login page,
//! contacts pages, and paginated collection pages. Request-count
//! expectations on the mocks pin the pagination, re-authentication, and
//! depth-cutoff behavior.

use async_trait::async_trait;
use cratedigger::auth::{Authenticator, ChallengeSolver};
use cratedigger::config::{Config, CrawlerConfig, CredentialsConfig, OutputConfig, SiteConfig};
use cratedigger::crawler::{CollectionFetcher, Scheduler};
use cratedigger::extract::{Challenge, SiteExtractor};
use cratedigger::output::write_results;
use cratedigger::registry::VisitState;
use cratedigger::session::Session;
use cratedigger::CrawlError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Challenge solver that answers from a script instead of a human
struct ScriptedSolver {
    solution: String,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    fn new(solution: &str) -> Self {
        Self {
            solution: solution.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for ScriptedSolver {
    async fn solve(&self, _challenge: &Challenge) -> cratedigger::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.solution.clone())
    }
}

/// Builds a config pointing every URL template at the mock server
fn test_config(base_url: &str, page_size: u32, max_depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed_id: "u1".to_string(),
            max_depth,
            max_workers: 2,
            page_size,
            rate_limit_min_ms: 0,
            rate_limit_max_ms: 1,
        },
        site: SiteConfig {
            login_url: format!("{}/accounts/login", base_url),
            contacts_url_template: format!("{}/people/{{id}}/contacts", base_url),
            collection_url_template: format!("{}/people/{{id}}/collect?start={{start}}", base_url),
            user_agent: "TestAgent/1.0".to_string(),
        },
        credentials: CredentialsConfig {
            email: "bot@example.com".to_string(),
            password: "secret".to_string(),
        },
        output: OutputConfig {
            results_path: "./unused.json".to_string(),
        },
    }
}

fn login_page_html(with_captcha: bool) -> String {
    let captcha = if with_captcha {
        r#"<img id="captcha_image" src="https://cdn.example.com/captcha/XYZ.jpg" alt="captcha" class="captcha_image"/>
           <input type="hidden" name="captcha-id" value="XYZ"/>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><form>
        {}
        <input name="source" type="hidden" value="music"/>
        <input name="redir" type="hidden" value="https://music.example.com/"/>
        </form></body></html>"#,
        captcha
    )
}

fn contacts_html(base_url: &str, contacts: &[(&str, &str)]) -> String {
    let entries: String = contacts
        .iter()
        .map(|(id, name)| format!(r#"<dd><a href="{}/people/{}/">{}</a></dd>"#, base_url, id, name))
        .collect();
    format!("<html><body><dl>{}</dl></body></html>", entries)
}

fn collection_html(count: usize, offset: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                r#"<a href="https://music.example.com/subject/s{n}/">Title {n}</a>
                <span class="intro">note {n}</span>"#,
                n = offset + i
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

/// Mounts the standard login flow: GET login page, POST redirecting to /home
async fn mount_login(server: &MockServer, with_captcha: bool) {
    let home = format!("{}/home", server.uri());

    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(with_captcha)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", home.as_str()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>home</body></html>"))
        .mount(server)
        .await;
}

fn build_authenticator(config: &Config, solver: Arc<dyn ChallengeSolver>) -> Arc<Authenticator> {
    Arc::new(Authenticator::new(
        &config.site.login_url,
        config.credentials.clone(),
        Arc::new(SiteExtractor::new()),
        solver,
    ))
}

fn build_fetcher(config: &Config, solver: Arc<dyn ChallengeSolver>) -> CollectionFetcher {
    let authenticator = build_authenticator(config, solver);
    CollectionFetcher::new(
        config.site.clone(),
        &config.crawler,
        Arc::new(SiteExtractor::new()),
        authenticator,
    )
}

fn new_session(config: &Config) -> Session {
    Session::new(&config.site.user_agent, &config.site.login_url).unwrap()
}

// ===== Authentication =====

#[tokio::test]
async fn test_login_success_authenticates_session() {
    let server = MockServer::start().await;
    mount_login(&server, false).await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let authenticator = build_authenticator(&config, solver.clone());

    let mut session = new_session(&config);
    let page = authenticator
        .login(&mut session, None, None)
        .await
        .expect("login should succeed");

    assert!(page.url.ends_with("/home"));
    assert!(session.is_authenticated());
    assert!(session.referer().ends_with("/home"));
    // No captcha on the page, so the solver is never consulted
    assert_eq!(solver.call_count(), 0);
}

#[tokio::test]
async fn test_login_with_captcha_submits_solution() {
    let server = MockServer::start().await;
    let home = format!("{}/home", server.uri());

    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(true)))
        .mount(&server)
        .await;

    // The POST only matches when the form carries the challenge id and the
    // scripted solution, so a successful login proves both were submitted
    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .and(body_string_contains("captcha-id=XYZ"))
        .and(body_string_contains("captcha-solution=W1RD"))
        .and(body_string_contains("form_email=bot%40example.com"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", home.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>home</body></html>"))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("W1RD"));
    let authenticator = build_authenticator(&config, solver.clone());

    let mut session = new_session(&config);
    authenticator
        .login(&mut session, None, None)
        .await
        .expect("captcha login should succeed");

    assert_eq!(solver.call_count(), 1);
}

#[tokio::test]
async fn test_login_missing_tokens_is_protocol_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><form></form></body></html>"),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let authenticator = build_authenticator(&config, solver);

    let mut session = new_session(&config);
    let result = authenticator.login(&mut session, None, None).await;

    assert!(matches!(result, Err(CrawlError::ProtocolMismatch(_))));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(false)))
        .mount(&server)
        .await;

    // The POST stays on the login page: credentials rejected
    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(false)))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let authenticator = build_authenticator(&config, solver);

    let mut session = new_session(&config);
    let result = authenticator.login(&mut session, None, None).await;

    assert!(matches!(result, Err(CrawlError::Auth(_))));
}

// ===== Pagination =====

#[tokio::test]
async fn test_pagination_stops_on_short_page() {
    let server = MockServer::start().await;

    // 12 items at page size 5: pages of 5, 5, 2 -> exactly 3 requests
    for (start, count, offset) in [("0", 5, 0), ("5", 5, 5), ("10", 2, 10)] {
        Mock::given(method("GET"))
            .and(path("/people/u1/collect"))
            .and(query_param("start", start))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(collection_html(count, offset)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = test_config(&server.uri(), 5, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let fetcher = build_fetcher(&config, solver);

    let mut session = new_session(&config);
    let items = fetcher
        .fetch_collection("u1", &mut session)
        .await
        .expect("fetch should succeed");

    assert_eq!(items.len(), 12);
    // Discovery order preserved across pages
    assert_eq!(items[0].item_id, "s0");
    assert_eq!(items[11].item_id, "s11");
}

#[tokio::test]
async fn test_pagination_exact_multiple_issues_extra_request() {
    let server = MockServer::start().await;

    // 10 items at page size 5: the second full page does not signal the
    // end, so an extra empty page is requested (documented boundary)
    for (start, count, offset) in [("0", 5, 0), ("5", 5, 5), ("10", 0, 10)] {
        Mock::given(method("GET"))
            .and(path("/people/u1/collect"))
            .and(query_param("start", start))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(collection_html(count, offset)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = test_config(&server.uri(), 5, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let fetcher = build_fetcher(&config, solver);

    let mut session = new_session(&config);
    let items = fetcher.fetch_collection("u1", &mut session).await.unwrap();

    assert_eq!(items.len(), 10);
}

#[tokio::test]
async fn test_fetch_error_carries_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let fetcher = build_fetcher(&config, solver);

    let mut session = new_session(&config);
    let result = fetcher.fetch_collection("u1", &mut session).await;

    assert!(matches!(
        result,
        Err(CrawlError::Fetch { status: 500, .. })
    ));
}

// ===== Re-authentication =====

#[tokio::test]
async fn test_login_bounce_reauths_once_and_retries() {
    let server = MockServer::start().await;
    let login = format!("{}/accounts/login", server.uri());
    mount_login(&server, false).await;

    // First collection request bounces to the login page; after re-auth the
    // retry is served. Mount order matters: the one-shot redirect matches
    // first, then falls through to the real page.
    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", login.as_str()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(3, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let fetcher = build_fetcher(&config, solver);

    let mut session = new_session(&config);
    let items = fetcher
        .fetch_collection("u1", &mut session)
        .await
        .expect("fetch should succeed after re-auth");

    assert_eq!(items.len(), 3);
    assert!(session.is_authenticated());
    // Mock .expect() counts verify on drop: one bounce, one POST login
    // (mounted in mount_login without expectations), one successful retry
}

#[tokio::test]
async fn test_second_login_bounce_is_fetch_error() {
    let server = MockServer::start().await;
    let login = format!("{}/accounts/login", server.uri());
    mount_login(&server, false).await;

    // Every collection request bounces, even after a successful re-auth:
    // the fetcher must give up instead of looping
    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", login.as_str()))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let fetcher = build_fetcher(&config, solver);

    let mut session = new_session(&config);
    let result = fetcher.fetch_collection("u1", &mut session).await;

    assert!(matches!(result, Err(CrawlError::Fetch { .. })));
}

// ===== Full crawl =====

/// Spec scenario: seed u1 at depth 0, max depth 1, two neighbors with
/// 10-item collections. All three end Done, and nothing is expanded from
/// depth 1.
#[tokio::test]
async fn test_end_to_end_depth_bounded_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/people/u1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(contacts_html(
            &base,
            &[("u2", "Second User"), ("u3", "Third User")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    // Depth 1 == max depth: neighbors' contacts must never be requested
    for id in ["u2", "u3"] {
        Mock::given(method("GET"))
            .and(path(format!("/people/{}/contacts", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(contacts_html(&base, &[])))
            .expect(0)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(4, 0)))
        .expect(1)
        .mount(&server)
        .await;

    for id in ["u2", "u3"] {
        Mock::given(method("GET"))
            .and(path(format!("/people/{}/collect", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(10, 0)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = test_config(&base, 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let scheduler = Scheduler::new(config, Arc::new(SiteExtractor::new()), solver)
        .expect("scheduler should build");

    scheduler.run().await.expect("crawl should complete");

    let entities = scheduler.registry().snapshot();
    assert_eq!(entities.len(), 3);

    let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);

    for entity in &entities {
        assert_eq!(entity.state, VisitState::Done, "entity {}", entity.id);
    }
    assert_eq!(entities[0].collection.len(), 4);
    assert_eq!(entities[1].collection.len(), 10);
    assert_eq!(entities[2].collection.len(), 10);
    assert_eq!(entities[1].display_name, "Second User");

    // Result sink round-trip
    let dir = tempfile::tempdir().unwrap();
    let results_path = dir.path().join("results.json");
    write_results(&results_path, &entities).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&results_path).unwrap()).unwrap();
    assert_eq!(parsed["users"].as_array().unwrap().len(), 3);
}

/// A neighbor discovered twice is enqueued twice but fetched once
#[tokio::test]
async fn test_duplicate_discovery_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/people/u1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(contacts_html(
            &base,
            &[("u2", "Second User"), ("u2", "Second User")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(1, 0)))
        .expect(1)
        .mount(&server)
        .await;

    // At-most-once processing: the duplicate task is an idempotent skip
    Mock::given(method("GET"))
        .and(path("/people/u2/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(2, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&base, 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let scheduler = Scheduler::new(config, Arc::new(SiteExtractor::new()), solver).unwrap();

    scheduler.run().await.expect("crawl should complete");

    let entities = scheduler.registry().snapshot();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[1].id, "u2");
    assert_eq!(entities[1].state, VisitState::Done);
    assert_eq!(entities[1].collection.len(), 2);
}

/// One entity failing does not abort the crawl; the rest still complete
#[tokio::test]
async fn test_failed_entity_does_not_abort_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/people/u1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(contacts_html(
            &base,
            &[("u2", "Second User"), ("u3", "Third User")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/u1/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(1, 0)))
        .mount(&server)
        .await;

    // u2's collection is broken on the server side
    Mock::given(method("GET"))
        .and(path("/people/u2/collect"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/u3/collect"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_html(5, 0)))
        .mount(&server)
        .await;

    let config = test_config(&base, 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let scheduler = Scheduler::new(config, Arc::new(SiteExtractor::new()), solver).unwrap();

    scheduler.run().await.expect("crawl should run to completion");

    let entities = scheduler.registry().snapshot();
    assert_eq!(entities.len(), 3);

    // u2 is stuck in Processing with no collection; u1 and u3 are Done
    assert_eq!(entities[0].state, VisitState::Done);
    assert_eq!(entities[1].state, VisitState::Processing);
    assert!(entities[1].collection.is_empty());
    assert_eq!(entities[2].state, VisitState::Done);
    assert_eq!(entities[2].collection.len(), 5);
}

/// A failed bootstrap login is fatal to the whole crawl
#[tokio::test]
async fn test_bootstrap_login_failure_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(false)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(false)))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 30, 1);
    let solver = Arc::new(ScriptedSolver::new("unused"));
    let scheduler = Scheduler::new(config, Arc::new(SiteExtractor::new()), solver).unwrap();

    let result = scheduler.run().await;
    assert!(matches!(result, Err(CrawlError::Auth(_))));
}
