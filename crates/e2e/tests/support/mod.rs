//! In-process stand-in for the book service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
struct Inner {
    /// email -> (user id, password)
    users: HashMap<String, (String, String)>,
    /// token -> user id
    sessions: HashMap<String, String>,
    books: HashMap<String, Value>,
    fail_create: bool,
}

#[derive(Clone, Default)]
pub struct StubService {
    inner: Arc<Mutex<Inner>>,
    ids: Arc<AtomicU64>,
}

impl StubService {
    /// Make every book creation answer 500
    pub fn fail_create(&self, fail: bool) {
        self.inner.lock().unwrap().fail_create = fail;
    }

    pub fn book_count(&self) -> usize {
        self.inner.lock().unwrap().books.len()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.ids.fetch_add(1, Ordering::SeqCst))
    }

    fn session(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers.get("X-Authorization")?.to_str().ok()?;
        self.inner.lock().unwrap().sessions.get(token).cloned()
    }
}

/// Start the stub on an ephemeral port and return its base URL
pub async fn spawn() -> (String, StubService) {
    let stub = StubService::default();
    let app = Router::new()
        .route("/", get(|| async { "bookshelf stub" }))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/data/books", post(create_book))
        .route("/data/books/:id", get(fetch_book).put(edit_book).delete(delete_book))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), stub)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "code": status.as_u16(), "message": message }))).into_response()
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

async fn register(State(stub): State<StubService>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if email.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Missing fields");
    }

    let id = stub.next_id("user");
    let token = stub.next_id("token");
    {
        let mut inner = stub.inner.lock().unwrap();
        if inner.users.contains_key(&email) {
            return error(StatusCode::CONFLICT, "A user with the same email already exists");
        }
        inner.users.insert(email.clone(), (id.clone(), password.clone()));
        inner.sessions.insert(token.clone(), id.clone());
    }

    Json(json!({
        "email": email,
        "password": password,
        "_createdOn": now_ms(),
        "_id": id,
        "accessToken": token,
    }))
    .into_response()
}

async fn login(State(stub): State<StubService>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let token = stub.next_id("token");
    let mut inner = stub.inner.lock().unwrap();
    let id = match inner.users.get(email) {
        Some((id, stored)) if stored == password => id.clone(),
        _ => return error(StatusCode::FORBIDDEN, "Login or password don't match"),
    };
    // One live session per user: older tokens stop working.
    inner.sessions.retain(|_, user| *user != id);
    inner.sessions.insert(token.clone(), id.clone());

    Json(json!({
        "email": email,
        "_createdOn": now_ms(),
        "_id": id,
        "accessToken": token,
    }))
    .into_response()
}

async fn logout(State(stub): State<StubService>, headers: HeaderMap) -> Response {
    let token = headers
        .get("X-Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if stub.inner.lock().unwrap().sessions.remove(token).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Invalid access token");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn create_book(
    State(stub): State<StubService>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(owner) = stub.session(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    if stub.inner.lock().unwrap().fail_create {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable");
    }

    let id = stub.next_id("book");
    let mut book = body;
    book["_ownerId"] = json!(owner);
    book["_createdOn"] = json!(now_ms());
    book["_id"] = json!(id);

    stub.inner.lock().unwrap().books.insert(id, book.clone());
    Json(book).into_response()
}

async fn fetch_book(State(stub): State<StubService>, Path(id): Path<String>) -> Response {
    match stub.inner.lock().unwrap().books.get(&id) {
        Some(book) => Json(book.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Resolve the caller and check they own `id`
fn authorize(stub: &StubService, headers: &HeaderMap, id: &str) -> Result<(), Response> {
    let owner = stub
        .session(headers)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
    let inner = stub.inner.lock().unwrap();
    let book = inner
        .books
        .get(id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not Found"))?;
    if book["_ownerId"] != json!(owner) {
        return Err(error(StatusCode::FORBIDDEN, "Forbidden"));
    }
    Ok(())
}

async fn edit_book(
    State(stub): State<StubService>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = authorize(&stub, &headers, &id) {
        return response;
    }

    let mut inner = stub.inner.lock().unwrap();
    let Some(existing) = inner.books.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, "Not Found");
    };
    let mut updated = body;
    updated["_ownerId"] = existing["_ownerId"].clone();
    updated["_createdOn"] = existing["_createdOn"].clone();
    updated["_updatedOn"] = json!(now_ms());
    updated["_id"] = json!(id);
    *existing = updated.clone();

    Json(updated).into_response()
}

async fn delete_book(
    State(stub): State<StubService>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authorize(&stub, &headers, &id) {
        return response;
    }
    stub.inner.lock().unwrap().books.remove(&id);
    Json(json!({ "_deletedOn": now_ms() })).into_response()
}
