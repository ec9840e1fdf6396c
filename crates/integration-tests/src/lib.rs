//! Integration tests for Recipe Box.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p recipe-box-integration-tests
//! ```
//!
//! Each [`TestApp`] is a complete application over a private in-memory
//! database and a temporary media directory. Requests are driven through the
//! router in-process, so no server or external database is needed.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use image::{ImageBuffer, ImageFormat, Rgb};
use recipe_box_api::{config::ApiConfig, db, routes, state::AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Default password for users created by [`TestApp::register`].
pub const PASSWORD: &str = "testpass123";

/// A response with its body decoded.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body; non-JSON bodies become a string, empty bodies `null`.
    pub body: Value,
    pub bytes: Vec<u8>,
}

/// A running application backed by an in-memory database.
pub struct TestApp {
    router: Router,
    pub pool: SqlitePool,
    pub media: TempDir,
}

impl TestApp {
    /// Build an application over a freshly migrated database.
    pub async fn new() -> Self {
        let media = TempDir::new().unwrap();
        let media_root = media.path().to_string_lossy().into_owned();

        let config = ApiConfig::from_lookup(|key| match key {
            "RECIPE_MEDIA_ROOT" => Some(media_root.clone()),
            "RECIPE_DATABASE_URL" => Some("sqlite::memory:".to_owned()),
            _ => None,
        })
        .unwrap();

        let pool = db::create_memory_pool().await.unwrap();
        db::migrate(&pool).await.unwrap();

        let router = routes::app(AppState::new(config, pool.clone()));

        Self {
            router,
            pool,
            media,
        }
    }

    /// Send a request, with an optional token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Send a single file as `multipart/form-data`.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> TestResponse {
        let boundary = format!("----recipe-box-{}", Uuid::new_v4().simple());
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Register a user through the API and return their token.
    pub async fn register(&self, email: &str) -> String {
        let created = self
            .post(
                "/user/create",
                None,
                &serde_json::json!({ "email": email, "password": PASSWORD, "name": "Test Cook" }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);

        self.login(email, PASSWORD).await
    }

    /// Exchange credentials for a token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post(
                "/user/token",
                None,
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["token"].as_str().unwrap().to_owned()
    }

    /// Create a tag and return its id.
    pub async fn create_tag(&self, token: &str, name: &str) -> i64 {
        self.create_named("/tags", token, name).await
    }

    /// Create an ingredient and return its id.
    pub async fn create_ingredient(&self, token: &str, name: &str) -> i64 {
        self.create_named("/ingredients", token, name).await
    }

    /// Create a recipe from a JSON payload and return its id.
    pub async fn create_recipe(&self, token: &str, payload: &Value) -> i64 {
        let response = self.post("/recipes", Some(token), payload).await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    async fn create_named(&self, uri: &str, token: &str, name: &str) -> i64 {
        let response = self
            .post(uri, Some(token), &serde_json::json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// A minimal recipe payload with the required fields.
#[must_use]
pub fn sample_recipe(title: &str) -> Value {
    serde_json::json!({
        "title": title,
        "time_minutes": 22,
        "price": "5.25",
    })
}

/// Encode a small solid-colour image.
#[must_use]
pub fn image_bytes(format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(10, 10, Rgb([200_u8, 120, 40]));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}

/// Sorted ids from a JSON array of objects or ids.
#[must_use]
pub fn ids(value: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().or_else(|| v["id"].as_i64()).unwrap())
        .collect();
    ids.sort_unstable();
    ids
}
