//! A minimal in-process media server for end-to-end tests: serves canned
//! library listings in the wire shape the client expects and records every
//! write it receives.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};

#[derive(Default)]
pub struct FakeServerInner {
    pub library_name: String,
    /// Raw item metadata in wire shape (`ratingKey`, `Guid`, ...).
    pub items: Vec<Value>,
    /// `(method, path-with-query)` of every request received.
    pub requests: Mutex<Vec<(String, String)>>,
}

#[derive(Clone, Default)]
pub struct FakeServer(pub Arc<FakeServerInner>);

impl FakeServer {
    pub fn new(library_name: &str, items: Vec<Value>) -> Self {
        Self(Arc::new(FakeServerInner {
            library_name: library_name.to_string(),
            items,
            requests: Mutex::new(Vec::new()),
        }))
    }

    pub fn record(&self, method: &str, path: &str, query: Option<&str>) {
        let full = match query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        self.0
            .requests
            .lock()
            .unwrap()
            .push((method.to_string(), full));
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.0.requests.lock().unwrap().clone()
    }

    pub fn requests_matching(&self, method: &str, path_prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|(m, p)| m == method && p.starts_with(path_prefix))
            .map(|(_, p)| p)
            .collect()
    }

    fn find_item(&self, key: &str) -> Option<Value> {
        self.0
            .items
            .iter()
            .find(|item| item.get("ratingKey").and_then(Value::as_str) == Some(key))
            .cloned()
    }
}

/// A wire-shaped movie item for the fake library.
pub fn wire_movie(key: &str, title: &str, guid: &str, guids: &[&str]) -> Value {
    json!({
        "ratingKey": key,
        "title": title,
        "year": 1999,
        "type": "movie",
        "guid": guid,
        "Guid": guids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}

async fn root(State(server): State<FakeServer>) -> axum::Json<Value> {
    server.record("GET", "/", None);
    axum::Json(json!({
        "MediaContainer": { "friendlyName": "Fake Server", "version": "1.0.0" }
    }))
}

async fn sections(State(server): State<FakeServer>) -> axum::Json<Value> {
    server.record("GET", "/library/sections", None);
    axum::Json(json!({
        "MediaContainer": {
            "Directory": [
                { "key": "1", "title": server.0.library_name, "type": "movie", "count": server.0.items.len(), "uuid": "lib-1" }
            ]
        }
    }))
}

async fn section_detail(
    State(server): State<FakeServer>,
    Path(library_id): Path<String>,
) -> axum::Json<Value> {
    server.record("GET", &format!("/library/sections/{library_id}"), None);
    axum::Json(json!({
        "MediaContainer": {
            "Directory": [
                { "key": library_id, "title": server.0.library_name, "type": "movie" }
            ]
        }
    }))
}

async fn section_items(
    State(server): State<FakeServer>,
    Path(library_id): Path<String>,
) -> axum::Json<Value> {
    server.record("GET", &format!("/library/sections/{library_id}/all"), None);
    axum::Json(json!({
        "MediaContainer": {
            "totalSize": server.0.items.len(),
            "Metadata": server.0.items,
        }
    }))
}

async fn item_metadata(
    State(server): State<FakeServer>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    server.record("GET", &format!("/library/metadata/{key}"), None);
    match server.find_item(&key) {
        Some(item) => axum::Json(json!({
            "MediaContainer": {
                "librarySectionTitle": server.0.library_name,
                "Metadata": [item],
            }
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn upload_poster(
    State(server): State<FakeServer>,
    Path(key): Path<String>,
    RawQuery(query): RawQuery,
) -> axum::Json<Value> {
    server.record(
        "POST",
        &format!("/library/metadata/{key}/posters"),
        query.as_deref(),
    );
    axum::Json(json!({}))
}

async fn upload_background(
    State(server): State<FakeServer>,
    Path(key): Path<String>,
    RawQuery(query): RawQuery,
) -> axum::Json<Value> {
    server.record(
        "POST",
        &format!("/library/metadata/{key}/arts"),
        query.as_deref(),
    );
    axum::Json(json!({}))
}

async fn update_item(
    State(server): State<FakeServer>,
    Path(key): Path<String>,
    RawQuery(query): RawQuery,
) -> axum::Json<Value> {
    server.record("PUT", &format!("/library/metadata/{key}"), query.as_deref());
    axum::Json(json!({}))
}

async fn serve_image(
    State(server): State<FakeServer>,
    Path(dimensions): Path<String>,
) -> impl IntoResponse {
    server.record("GET", &format!("/image/{dimensions}"), None);
    let (width, height) = dimensions
        .split_once('x')
        .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
        .unwrap_or((600, 900));
    ([("content-type", "image/png")], png_bytes(width, height))
}

/// Bind the fake server on an ephemeral port and return its base URL.
pub async fn spawn(server: FakeServer) -> String {
    let app = Router::new()
        .route("/", get(root))
        .route("/library/sections", get(sections))
        .route("/library/sections/{library_id}", get(section_detail))
        .route("/library/sections/{library_id}/all", get(section_items))
        .route("/library/metadata/{key}", get(item_metadata).put(update_item))
        .route("/library/metadata/{key}/posters", post(upload_poster))
        .route("/library/metadata/{key}/arts", post(upload_background))
        .route("/image/{dimensions}", get(serve_image))
        .with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
