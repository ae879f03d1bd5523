//! Mock publisher site plus a throwaway storage layout

use issue_dl::{Config, FsCache, IssueCache, IssueNumber, Service};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal body that passes the PDF header check
pub const DOC: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// Mock server, temp directories and a config wired to both
pub struct TestEnv {
    pub server: MockServer,
    pub temp: TempDir,
    pub config: Config,
}

impl TestEnv {
    /// Start a mock server and point every URL and directory at it
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        let mut config = Config::default();
        config.resolver.primary_page_url = format!("{}/current-issue.php", server.uri());
        config.resolver.directory_page_url = format!("{}/thebpview", server.uri());
        config.resolver.issue_base_url = format!("{}/docs", server.uri());
        config.resolver.request_timeout = Duration::from_secs(5);
        config.storage.staging_dir = temp.path().join("downloads");
        config.storage.cache_dir = temp.path().join("cache");
        config.download.timeout = Duration::from_secs(5);
        config.download.retry.max_attempts = 1;
        config.download.retry.initial_delay = Duration::from_millis(10);
        config.download.retry.jitter = false;
        config.schedule.run_on_startup = false;

        std::fs::create_dir_all(&config.storage.staging_dir).unwrap();
        std::fs::write(
            config.storage.staging_dir.join(&config.storage.placeholder_name),
            "",
        )
        .unwrap();

        Self {
            server,
            temp,
            config,
        }
    }

    pub fn service(&self) -> Service {
        Service::from_config(&self.config).unwrap()
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.config.storage.staging_dir.clone()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config.storage.cache_dir.clone()
    }

    pub fn placeholder(&self) -> PathBuf {
        self.staging_dir().join(&self.config.storage.placeholder_name)
    }

    /// Write a file into the staging directory
    pub fn stage(&self, name: &str, body: &[u8]) {
        std::fs::write(self.staging_dir().join(name), body).unwrap();
    }

    /// Put `issue` into the cache through the real cache implementation
    pub async fn seed_cache(&self, issue: u32) {
        let seed_dir = self.temp.path().join("seed");
        std::fs::create_dir_all(&seed_dir).unwrap();
        let source = seed_dir.join(format!("issue {issue}.pdf"));
        std::fs::write(&source, DOC).unwrap();

        FsCache::new(self.cache_dir())
            .store(&source, IssueNumber::new(issue).unwrap())
            .await
            .unwrap();
    }

    /// Current-issue page carrying an embed reference to `issue`
    pub async fn serve_primary_embed(&self, issue: u32) {
        let html = format!(
            r#"<html><body>
<h1>The Current Issue</h1>
<iframe src="https://e.issuu.com/embed.html?d=issue_{issue}&u=thebpview"></iframe>
<p>Read Issue {older} in the archive</p>
</body></html>"#,
            older = issue - 1
        );
        Mock::given(method("GET"))
            .and(path("/current-issue.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&self.server)
            .await;
    }

    /// Directory listing with one link per issue, in the given order
    pub async fn serve_directory(&self, issues: &[u32]) {
        let links: String = issues
            .iter()
            .map(|i| format!(r#"<a href="/thebpview/docs/issue_{i}"><span>Issue {i}</span></a>"#))
            .collect();
        Mock::given(method("GET"))
            .and(path("/thebpview"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(format!("<html><body>{links}</body></html>")),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve the PDF for `issue`, expecting exactly `calls` requests
    pub async fn serve_document(&self, issue: u32, calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/docs/issue_{issue}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(DOC),
            )
            .expect(calls)
            .mount(&self.server)
            .await;
    }
}
