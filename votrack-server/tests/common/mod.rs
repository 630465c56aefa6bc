//! Shared harness for the integration tests
//!
//! Each test gets its own temporary root folder with a fresh database and
//! evidence directory, and drives the router with `oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;
use votrack_common::db::init_database;
use votrack_common::events::EventBus;
use votrack_common::Role;
use votrack_server::db::users::{create_user, NewUser};
use votrack_server::evidence::LocalEvidenceStore;
use votrack_server::{build_router, AppState};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub bus: EventBus,
    pub dir: TempDir,
}

/// A logged-in account
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub token: String,
}

/// One account per role, with two coordinador/líder branches
pub struct World {
    pub admin: Account,
    pub coord1: Account,
    pub coord2: Account,
    pub lider1: Account,
    pub lider2: Account,
    pub validador: Account,
    pub confirmador: Account,
    pub consultor: Account,
}

pub async fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("votrack.db")).await.unwrap();
    let evidence = Arc::new(LocalEvidenceStore::new(dir.path().join("evidence")));
    let bus = EventBus::new(64);
    let state = AppState::new(pool.clone(), bus.clone(), evidence);

    TestApp {
        router: build_router(state),
        pool,
        bus,
        dir,
    }
}

impl TestApp {
    pub fn evidence_dir(&self) -> PathBuf {
        self.dir.path().join("evidence")
    }

    pub async fn create_account(
        &self,
        username: &str,
        role: Role,
        coordinador_id: Option<Uuid>,
    ) -> Account {
        let user = create_user(
            &self.pool,
            NewUser {
                username: username.to_string(),
                display_name: format!("{} name", username),
                role,
                coordinador_id,
                password: PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();
        let token = self.login(username).await;
        Account { id: user.id, token }
    }

    pub async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": username, "password": PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn world(&self) -> World {
        let admin = self.create_account("admin", Role::Admin, None).await;
        let coord1 = self.create_account("coord1", Role::Coordinador, None).await;
        let coord2 = self.create_account("coord2", Role::Coordinador, None).await;
        let lider1 = self.create_account("lider1", Role::Lider, Some(coord1.id)).await;
        let lider2 = self.create_account("lider2", Role::Lider, Some(coord2.id)).await;
        let validador = self.create_account("validador", Role::Validador, None).await;
        let confirmador = self.create_account("confirmador", Role::Confirmador, None).await;
        let consultor = self.create_account("consultor", Role::Consultor, None).await;

        World {
            admin,
            coord1,
            coord2,
            lider1,
            lider2,
            validador,
            confirmador,
            consultor,
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send and decode the JSON body (`Value::Null` for empty bodies)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = body_bytes(response).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register a persona as `account`; returns its id
    pub async fn persona(
        &self,
        account: &Account,
        documento: &str,
        lider_id: Option<Uuid>,
    ) -> String {
        let mut body = json!({
            "documento": documento,
            "nombres": "Ana",
            "apellidos": "Gómez",
            "telefono": "300 123 4567",
        });
        if let Some(lider_id) = lider_id {
            body["lider_id"] = json!(lider_id);
        }
        let (status, body) = self
            .call("POST", "/api/personas", Some(&account.token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn estado_of(&self, account: &Account, persona_id: &str) -> String {
        let (status, body) = self
            .call("GET", &format!("/api/personas/{}", persona_id), Some(&account.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["estado"].as_str().unwrap().to_string()
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}
