//! End-to-end tests of the HTTP API over an in-memory database, in-memory
//! object storage, and a fake cluster.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::header::{COOKIE, ETAG, LOCATION, SET_COOKIE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use modelyard_core::kubernetes::{
    BentoDeployment, BentoDeploymentClient, BentoDeploymentCondition, BentoDeploymentStatus,
    ClusterConnector,
};
use modelyard_core::{signing, Cluster, DatabaseConfig, KubePodWithStatus, Result, User};
use modelyard_server::auth::{issue_session, SessionClaims, API_TOKEN_HEADER, SESSION_COOKIE};
use modelyard_server::{build_control_plane, create_router, AppState, ServerConfig, StorageBackend};

const EXTERNAL_URL: &str = "http://modelyard.test";
const INDEX_HTML: &str = "<!doctype html><title>Modelyard</title>";

#[derive(Default)]
struct FakeCluster {
    resources: Mutex<HashMap<(String, String), BentoDeployment>>,
    versions: AtomicU64,
    /// Status the operator reports on every stored resource.
    rollout: Mutex<Option<BentoDeploymentStatus>>,
}

struct FakeNamespace {
    cluster: Arc<FakeCluster>,
    namespace: String,
}

impl FakeNamespace {
    fn store(&self, resource: &BentoDeployment) -> BentoDeployment {
        let name = resource.metadata.name.clone().unwrap_or_default();
        let mut stored = resource.clone();
        let version = self.cluster.versions.fetch_add(1, Ordering::SeqCst) + 1;
        stored.metadata.resource_version = Some(version.to_string());
        stored.status = self.cluster.rollout.lock().unwrap().clone();
        self.cluster
            .resources
            .lock()
            .unwrap()
            .insert((self.namespace.clone(), name), stored.clone());
        stored
    }
}

#[async_trait]
impl BentoDeploymentClient for FakeNamespace {
    async fn get(&self, name: &str) -> Result<Option<BentoDeployment>> {
        let resources = self.cluster.resources.lock().unwrap();
        Ok(resources
            .get(&(self.namespace.clone(), name.to_string()))
            .cloned())
    }

    async fn create(&self, resource: &BentoDeployment) -> Result<BentoDeployment> {
        Ok(self.store(resource))
    }

    async fn update(&self, resource: &BentoDeployment) -> Result<BentoDeployment> {
        Ok(self.store(resource))
    }
}

struct FakeConnector(Arc<FakeCluster>);

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn bento_deployments(
        &self,
        _cluster: &Cluster,
        namespace: &str,
    ) -> Result<Arc<dyn BentoDeploymentClient>> {
        Ok(Arc::new(FakeNamespace {
            cluster: self.0.clone(),
            namespace: namespace.to_string(),
        }))
    }

    async fn list_pods(
        &self,
        _cluster: &Cluster,
        _namespace: &str,
        _selector: &str,
    ) -> Result<Vec<KubePodWithStatus>> {
        Ok(Vec::new())
    }
}

struct TestApp {
    server: TestServer,
    kube: Arc<FakeCluster>,
    /// Alice's session, set by [`bootstrap`].
    session: OnceLock<HeaderValue>,
    _ui_dir: TempDir,
}

impl TestApp {
    /// Cookie header carrying alice's session.
    fn auth(&self) -> (HeaderName, HeaderValue) {
        let session = self.session.get().expect("bootstrap first");
        (COOKIE, session.clone())
    }
}

/// Turn a `Set-Cookie` response header into the matching `Cookie` header.
fn cookie_from(response: &axum_test::TestResponse) -> HeaderValue {
    let set_cookie = response.header(SET_COOKIE);
    let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
    assert!(pair.starts_with(&format!("{}=", SESSION_COOKIE)));
    HeaderValue::from_str(pair).unwrap()
}

fn session_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        COOKIE,
        HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
    )
}

async fn test_app() -> TestApp {
    let ui_dir = TempDir::new().unwrap();
    std::fs::write(ui_dir.path().join("index.html"), INDEX_HTML).unwrap();

    let config = ServerConfig::default()
        .with_database(DatabaseConfig::in_memory())
        .with_storage(StorageBackend::Memory)
        .with_ui_dist_dir(ui_dir.path())
        .with_external_url(EXTERNAL_URL)
        .with_signing_key("test-key");
    let kube = Arc::new(FakeCluster::default());
    let cp = build_control_plane(&config)
        .await
        .unwrap()
        .with_kube(Arc::new(FakeConnector(kube.clone())));

    let server = TestServer::new(create_router(AppState::new(cp, config))).unwrap();
    TestApp {
        server,
        kube,
        session: OnceLock::new(),
        _ui_dir: ui_dir,
    }
}

/// Register alice, create org acme and model repository iris.
async fn bootstrap(app: &TestApp) {
    let response = app
        .server
        .post("/api/v1/users")
        .json(&json!({ "name": "alice", "email": "alice@example.com" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    app.session.set(cookie_from(&response)).unwrap();

    let (name, value) = app.auth();
    app.server
        .post("/api/v1/orgs")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "acme" }))
        .await
        .assert_status(StatusCode::CREATED);
    app.server
        .post("/api/v1/orgs/acme/model_repositories")
        .add_header(name, value)
        .json(&json!({ "name": "iris", "labels": [{ "key": "team", "value": "ml" }] }))
        .await
        .assert_status(StatusCode::CREATED);
}

async fn create_model(app: &TestApp, version: &str, stage: &str) -> Value {
    let (name, value) = app.auth();
    let response = app
        .server
        .post("/api/v1/orgs/acme/model_repositories/iris/models")
        .add_header(name, value)
        .json(&json!({
            "version": version,
            "labels": [{ "key": "stage", "value": stage }],
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

const MODEL: &str = "/api/v1/orgs/acme/model_repositories/iris/models/v1";

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let response = app.server.get("/healthz").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database_connected"], true);
}

#[tokio::test]
async fn test_user_bootstrap_and_authentication() {
    let app = test_app().await;
    let response = app
        .server
        .post("/api/v1/users")
        .json(&json!({ "name": "alice" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["name"], "alice");
    assert!(body["api_token"].as_str().is_some_and(|t| !t.is_empty()));
    let alice = (COOKIE, cookie_from(&response));

    // Once a user exists, registration needs credentials.
    let response = app
        .server
        .post("/api/v1/users")
        .json(&json!({ "name": "mallory" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

    // Users registered by someone else get a token but no session.
    let response = app
        .server
        .post("/api/v1/users")
        .add_header(alice.0.clone(), alice.1.clone())
        .json(&json!({ "name": "bob" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let bob_token = response.json::<Value>()["api_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .get("/api/v1/auth/current")
        .add_header(alice.0.clone(), alice.1.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "alice");

    // Bob logs in with his token and from then on uses the session.
    let response = app
        .server
        .post("/api/v1/auth/login")
        .add_header(
            HeaderName::from_static(API_TOKEN_HEADER),
            HeaderValue::from_str(&bob_token).unwrap(),
        )
        .await;
    response.assert_status_ok();
    let bob = cookie_from(&response);
    let response = app
        .server
        .get("/api/v1/auth/current")
        .add_header(COOKIE, bob)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "bob");

    app.server
        .post("/api/v1/auth/login")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/v1/auth/current")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_session_cookies_are_rejected() {
    let app = test_app().await;
    bootstrap(&app).await;
    let alice = User {
        id: 1,
        uid: "forged".to_string(),
        name: "alice".to_string(),
        email: String::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    // A bare username, the old cookie name, and garbage.
    for forged in [
        session_header("alice"),
        (COOKIE, HeaderValue::from_static("modelyard-username=alice")),
        session_header("not.a.jwt"),
    ] {
        app.server
            .get("/api/v1/auth/current")
            .add_header(forged.0, forged.1)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Well-formed but signed with another key.
    let (name, value) = session_header(&issue_session("some-other-key", &alice).unwrap());
    let response = app
        .server
        .get("/api/v1/auth/current")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

    // Genuine signature over a claim for someone else's name, spliced in.
    let genuine = issue_session("test-key", &alice).unwrap();
    let mallory = signing::sign(
        "some-other-key",
        &SessionClaims {
            sub: "mallory".to_string(),
            exp: signing::expires_in(std::time::Duration::from_secs(60)),
        },
    )
    .unwrap();
    let mut spliced: Vec<&str> = genuine.split('.').collect();
    spliced[1] = mallory.split('.').nth(1).unwrap();
    let (name, value) = session_header(&spliced.join("."));
    app.server
        .get("/api/v1/auth/current")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Expired.
    let expired = signing::sign(
        "test-key",
        &SessionClaims {
            sub: "alice".to_string(),
            exp: 1_000,
        },
    )
    .unwrap();
    let (name, value) = session_header(&expired);
    app.server
        .get("/api/v1/auth/current")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // A valid session for a user that does not exist.
    let ghost = User {
        name: "ghost".to_string(),
        ..alice
    };
    let (name, value) = session_header(&issue_session("test-key", &ghost).unwrap());
    app.server
        .get("/api/v1/auth/current")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // The server-issued session still works.
    let (name, value) = app.auth();
    app.server
        .get("/api/v1/auth/current")
        .add_header(name, value)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_organization_and_repository_lookup() {
    let app = test_app().await;
    bootstrap(&app).await;
    let (name, value) = app.auth();

    let response = app
        .server
        .get("/api/v1/orgs/acme")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_ok();
    let org = response.json::<Value>();
    assert_eq!(org["name"], "acme");
    assert!(org.get("config").is_none());

    let response = app
        .server
        .get("/api/v1/orgs/acme/model_repositories/iris")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_ok();
    let repository = response.json::<Value>();
    assert_eq!(repository["labels"][0]["key"], "team");
    assert!(repository["latest_model"].is_null());

    let response = app
        .server
        .post("/api/v1/orgs/acme/model_repositories")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "iris" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = app
        .server
        .get("/api/v1/orgs/acme/model_repositories/missing")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_model_create_list_and_update() {
    let app = test_app().await;
    bootstrap(&app).await;
    let created = create_model(&app, "v1", "dev").await;
    assert_eq!(created["upload_status"], "pending");
    assert_eq!(created["tag"], "iris:v1");
    create_model(&app, "v2", "prod").await;
    let (name, value) = app.auth();

    let response = app
        .server
        .get("/api/v1/orgs/acme/model_repositories/iris/models")
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_ok();
    let page = response.json::<Value>();
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["version"], "v2");

    let response = app
        .server
        .get("/api/v1/orgs/acme/model_repositories/iris/models")
        .add_query_param("labels", "stage=dev")
        .add_header(name.clone(), value.clone())
        .await;
    let page = response.json::<Value>();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["version"], "v1");

    let response = app
        .server
        .get("/api/v1/orgs/acme/models")
        .add_query_param("repositories", "iris")
        .add_query_param("count", "1")
        .add_header(name.clone(), value.clone())
        .await;
    let page = response.json::<Value>();
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let response = app
        .server
        .patch(MODEL)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "image_build_status": "success",
            "labels": [{ "key": "stage", "value": "staging" }],
        }))
        .await;
    response.assert_status_ok();
    let updated = response.json::<Value>();
    assert_eq!(updated["image_build_status"], "success");
    assert_eq!(updated["labels"][0]["value"], "staging");

    let response = app
        .server
        .get("/api/v1/orgs/acme/model_repositories/iris")
        .add_header(name, value)
        .await;
    assert_eq!(response.json::<Value>()["latest_model"]["version"], "v2");
}

#[tokio::test]
async fn test_upload_and_download() {
    let app = test_app().await;
    bootstrap(&app).await;
    create_model(&app, "v1", "dev").await;
    let (name, value) = app.auth();

    let response = app
        .server
        .put(&format!("{}/upload", MODEL))
        .add_header(name.clone(), value.clone())
        .bytes(Bytes::from_static(b"model archive"))
        .await;
    response.assert_status_ok();
    let uploaded = response.json::<Value>();
    assert_eq!(uploaded["upload_status"], "success");
    assert!(!uploaded["upload_finished_at"].is_null());

    let response = app
        .server
        .get(&format!("{}/download", MODEL))
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"model archive");

    let response = app
        .server
        .post(&format!("{}/presign_download_url", MODEL))
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["presigned_download_url"].is_string());
}

#[tokio::test]
async fn test_start_and_finish_upload() {
    let app = test_app().await;
    bootstrap(&app).await;
    create_model(&app, "v1", "dev").await;
    let (name, value) = app.auth();

    let response = app
        .server
        .post(&format!("{}/start_upload", MODEL))
        .add_header(name.clone(), value.clone())
        .await;
    let started = response.json::<Value>();
    assert_eq!(started["upload_status"], "uploading");
    assert!(!started["upload_started_at"].is_null());

    let response = app
        .server
        .post(&format!("{}/finish_upload", MODEL))
        .add_header(name, value)
        .json(&json!({ "status": "failed", "reason": "connection reset" }))
        .await;
    let finished = response.json::<Value>();
    assert_eq!(finished["upload_status"], "failed");
    assert_eq!(finished["upload_finished_reason"], "connection reset");
}

#[tokio::test]
async fn test_multipart_upload_through_part_urls() {
    let app = test_app().await;
    bootstrap(&app).await;
    create_model(&app, "v1", "dev").await;
    let (name, value) = app.auth();

    let upload_id = app
        .server
        .post(&format!("{}/start_multipart_upload", MODEL))
        .add_header(name.clone(), value.clone())
        .await
        .json::<Value>()["upload_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut parts = Vec::new();
    for (number, chunk) in [(1, "first "), (2, "second")] {
        let url = app
            .server
            .post(&format!("{}/presign_multipart_upload_url", MODEL))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "upload_id": upload_id, "part_number": number }))
            .await
            .json::<Value>()["url"]
            .as_str()
            .unwrap()
            .to_string();
        let path = url.strip_prefix(EXTERNAL_URL).unwrap();

        // The signed token is the only credential a part upload carries.
        let response = app
            .server
            .put(path)
            .bytes(Bytes::from(chunk.as_bytes().to_vec()))
            .await;
        response.assert_status_ok();
        let etag = response.header(ETAG).to_str().unwrap().to_string();
        parts.push(json!({ "part_number": number, "etag": etag }));

        if number == 1 {
            let forged = path.replace("token=", "token=x");
            app.server
                .put(&forged)
                .bytes(Bytes::from_static(b"evil"))
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
    }

    app.server
        .post(&format!("{}/complete_multipart_upload", MODEL))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "upload_id": upload_id, "parts": parts }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .get(&format!("{}/download", MODEL))
        .add_header(name, value)
        .await;
    assert_eq!(response.as_bytes().as_ref(), b"first second");
}

#[tokio::test]
async fn test_bentos_and_deployments() {
    let app = test_app().await;
    bootstrap(&app).await;
    let model = create_model(&app, "v1", "dev").await;
    let (name, value) = app.auth();

    app.server
        .post("/api/v1/orgs/acme/clusters")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "default" }))
        .await
        .assert_status(StatusCode::CREATED);
    app.server
        .post("/api/v1/orgs/acme/bento_repositories")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "iris-svc" }))
        .await
        .assert_status(StatusCode::CREATED);
    let response = app
        .server
        .post("/api/v1/orgs/acme/bento_repositories/iris-svc/bentos")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "version": "v1", "model_ids": [model["id"]] }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let bento = response.json::<Value>();
    assert_eq!(bento["tag"], "iris-svc:v1");
    assert_eq!(bento["models"][0], model["uid"]);

    let deployments = "/api/v1/orgs/acme/clusters/default/deployments";
    let response = app
        .server
        .post(deployments)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "name": "iris-prod",
            "kube_namespace": "serving",
            "labels": [{ "key": "env", "value": "prod" }],
            "target": { "bento_repository": "iris-svc", "bento": "v1" },
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    assert_eq!(created["cluster"], "default");
    assert_eq!(created["status"], "deploying");
    assert_eq!(
        created["latest_target"]["config"]["kube_resource_version"],
        "1"
    );
    assert!(app
        .kube
        .resources
        .lock()
        .unwrap()
        .contains_key(&("serving".to_string(), "iris-prod".to_string())));

    let deployment = format!("{}/iris-prod", deployments);
    let response = app
        .server
        .put(&deployment)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "target": {
                "bento_repository": "iris-svc",
                "bento": "v1",
                "config": { "enable_ingress": true },
            },
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["latest_target"]["config"]["enable_ingress"],
        true
    );

    let response = app
        .server
        .get(deployments)
        .add_query_param("labels", "env=prod")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.json::<Value>()["total"], 1);

    app.server
        .post(&format!("{}/sync_status", deployment))
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_ok();

    app.server
        .post(deployments)
        .add_header(name, value)
        .json(&json!({
            "name": "broken",
            "target": { "bento_repository": "iris-svc", "bento": "v9" },
        }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deployment_status_syncs_after_create() {
    let app = test_app().await;
    bootstrap(&app).await;
    let (name, value) = app.auth();
    *app.kube.rollout.lock().unwrap() = Some(BentoDeploymentStatus {
        replicas: 1,
        available_replicas: 1,
        conditions: vec![BentoDeploymentCondition {
            type_: "Available".to_string(),
            status: "True".to_string(),
            message: None,
        }],
    });

    for (path, body) in [
        ("/api/v1/orgs/acme/clusters", json!({ "name": "default" })),
        (
            "/api/v1/orgs/acme/bento_repositories",
            json!({ "name": "iris-svc" }),
        ),
        (
            "/api/v1/orgs/acme/bento_repositories/iris-svc/bentos",
            json!({ "version": "v1" }),
        ),
    ] {
        app.server
            .post(path)
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let deployments = "/api/v1/orgs/acme/clusters/default/deployments";
    let response = app
        .server
        .post(deployments)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "name": "iris-prod",
            "target": { "bento_repository": "iris-svc", "bento": "v1" },
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    assert_eq!(created["status"], "deploying");
    assert!(created["status_updated_at"].is_null());

    // The refresh starts once the request has committed; poll for it.
    let mut current = Value::Null;
    for _ in 0..100 {
        current = app
            .server
            .get(&format!("{}/iris-prod", deployments))
            .add_header(name.clone(), value.clone())
            .await
            .json::<Value>();
        if current["status"] == "running" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(current["status"], "running");
    assert!(current["status_syncing_at"].is_string());
    assert!(current["status_updated_at"].is_string());
    assert_eq!(current["latest_target"]["config"]["kube_resource_version"], "1");
}

#[tokio::test]
async fn test_api_token_lifecycle() {
    let app = test_app().await;
    bootstrap(&app).await;
    let (name, value) = app.auth();

    let response = app
        .server
        .post("/api/v1/api_tokens")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "name": "ci", "scopes": ["api"] }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    let token = created["token"].as_str().unwrap().to_string();
    assert!(created.get("token_hash").is_none());
    assert_eq!(created["is_expired"], false);

    let header = HeaderName::from_static(API_TOKEN_HEADER);
    let response = app
        .server
        .get("/api/v1/auth/current")
        .add_header(header.clone(), HeaderValue::from_str(&token).unwrap())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "alice");

    let listed = app
        .server
        .get("/api/v1/api_tokens")
        .add_header(name.clone(), value.clone())
        .await
        .json::<Value>();
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"ci") && names.contains(&"default"));
    assert!(listed[0].get("token").is_none());

    app.server
        .delete("/api/v1/api_tokens/ci")
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .delete("/api/v1/api_tokens/ci")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/api/v1/auth/current")
        .add_header(header, HeaderValue::from_str(&token).unwrap())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ui_index_and_logout() {
    let app = test_app().await;

    let response = app.server.get("/").await;
    response.assert_status_ok();
    assert_eq!(response.text(), INDEX_HTML);

    // Client-side routes fall back to the entry page.
    let response = app.server.get("/models/iris").await;
    response.assert_status_ok();
    assert_eq!(response.text(), INDEX_HTML);

    let response = app.server.get("/api/v1/nothing-here").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");

    let response = app.server.get("/logout").await;
    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header(LOCATION), "/login");
    assert!(response
        .header(SET_COOKIE)
        .to_str()
        .unwrap()
        .starts_with("modelyard-session=;"));
}
