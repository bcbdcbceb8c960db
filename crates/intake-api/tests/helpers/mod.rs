//! Test helpers: build AppState and router for endpoint tests.
//!
//! Every app gets its own in-memory identity store, its own admission counters and
//! local storage in a temporary directory, so tests never share state.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use intake_api::services::{IdGenerator, SessionIdentityManager};
use intake_api::setup::routes;
use intake_api::AppState;
use intake_core::{Config, IdentityStoreBackend, ServerConfig, SessionId, StorageBackend};
use intake_db::MemoryIdentityStore;
use intake_storage::{LocalStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

pub const FILES_BASE_URL: &str = "http://localhost:3000/files";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store: MemoryIdentityStore,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.state.storage
    }

    /// Mint a session through the API.
    pub async fn new_session(&self) -> SessionId {
        let response = self.server.post("/session/generate-uuid").await;
        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        body["uuid"].as_str().unwrap().parse().unwrap()
    }
}

pub fn test_config(temp_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        environment: "test".to_string(),
        identity_store: IdentityStoreBackend::Memory,
        storage_backend: StorageBackend::Local,
        local_storage_path: Some(temp_dir.path().to_string_lossy().into_owned()),
        local_storage_base_url: Some(FILES_BASE_URL.to_string()),
        admission_limit: 1_000,
        ..ServerConfig::default()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|config| config, None).await
}

/// Build an app with adjusted settings and, optionally, a scripted id generator.
pub async fn setup_test_app_with(
    customize: impl FnOnce(ServerConfig) -> ServerConfig,
    generator: Option<IdGenerator>,
) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config::new(customize(test_config(&temp_dir)));

    let store = MemoryIdentityStore::new();
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path(), FILES_BASE_URL.to_string())
            .await
            .expect("Failed to create local storage"),
    );

    let mut state = AppState::new(config.clone(), Arc::new(store.clone()), storage.clone());
    if let Some(generator) = generator {
        let identity = SessionIdentityManager::new(Arc::new(store.clone()), storage)
            .with_generator(generator);
        state = state.with_identity(identity);
    }
    let state = Arc::new(state);

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        store,
        _temp_dir: temp_dir,
    }
}

pub fn pdf_part(name: &str, size: usize) -> Part {
    Part::bytes(bytes::Bytes::from(vec![b'%'; size]))
        .file_name(name)
        .mime_type("application/pdf")
}

pub fn upload_form(session_id: &str, parts: Vec<Part>) -> MultipartForm {
    parts
        .into_iter()
        .fold(MultipartForm::new().add_text("sessionId", session_id.to_string()), |form, part| {
            form.add_part("file", part)
        })
}
