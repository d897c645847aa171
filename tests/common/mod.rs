#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode};

use school_api_rust::api::{app, AppState, Services};
use school_api_rust::auth::JwtTokenService;
use school_api_rust::config::AppConfig;
use school_api_rust::store::MemoryDirectory;
use school_api_rust::types::{EntityId, Principal};

pub const SECRET: &str = "integration-test-secret";

/// One in-process server per test, on its own port with its own stores
pub struct TestServer {
    pub base_url: String,
    pub directory: Arc<MemoryDirectory>,
    pub tokens: Arc<JwtTokenService>,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(AppConfig::development(), |_| {}).await
    }

    pub async fn without_rate_limit() -> Result<Self> {
        let mut config = AppConfig::development();
        config.rate_limit.enabled = false;
        Self::start_with(config, |_| {}).await
    }

    pub async fn start_with(config: AppConfig, customize: impl FnOnce(&mut Services)) -> Result<Self> {
        // RUST_LOG=debug shows the stage trace for a failing test
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let directory = Arc::new(MemoryDirectory::new());
        let tokens = Arc::new(JwtTokenService::new(SECRET, 1)?);

        let mut services = Services::in_memory(directory.clone(), tokens.clone());
        customize(&mut services);
        let state = AppState::new(services, &config)?;

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                eprintln!("test server stopped: {}", e);
            }
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            directory,
            tokens,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request against `/api/<module>/<function>`
    pub fn api(&self, method: Method, module: &str, function: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(&format!("/api/{}/{}", module, function)))
    }

    pub fn token(&self, principal: &Principal) -> String {
        self.tokens
            .issue(principal.user_id(), principal.user_id().as_str())
            .expect("token issue")
    }
}

/// Two schools, one classroom and one student in the first, an admin for each
pub struct Campus {
    pub north: EntityId,
    pub south: EntityId,
    pub classroom: EntityId,
    pub student: EntityId,
    pub root: Principal,
    pub north_admin: Principal,
    pub south_admin: Principal,
}

impl Campus {
    pub async fn seed(directory: &MemoryDirectory) -> Result<Self> {
        let north = directory.add_school("North High").await.id;
        let south = directory.add_school("South High").await.id;
        let classroom = directory.add_classroom(&north, "Room 101").await?.id;
        let student = directory
            .add_student(None, Some(&classroom), "Ada", "Lovelace")
            .await?
            .id;

        Ok(Self {
            root: directory.add_superadmin("root").await,
            north_admin: directory.add_school_admin("north.admin", &north).await?,
            south_admin: directory.add_school_admin("south.admin", &south).await?,
            north,
            south,
            classroom,
            student,
        })
    }
}

pub async fn json(res: reqwest::Response) -> Result<serde_json::Value> {
    res.json::<serde_json::Value>()
        .await
        .context("response body is not JSON")
}
