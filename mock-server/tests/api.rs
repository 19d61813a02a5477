use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, ApiFailure, AuthConfig, RefreshResponse, Todo};
use tower::ServiceExt;

const TOKEN: &str = "dev-access-token";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    authed(method, uri, TOKEN)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    authed(method, uri, TOKEN).body(String::new()).unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app(AuthConfig::default())
        .oneshot(Request::builder().uri("/todos").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let failure: ApiFailure = body_json(resp).await;
    assert_eq!(failure.error, "missing bearer token");
}

#[tokio::test]
async fn stale_token_returns_401_expired() {
    let resp = app(AuthConfig::default())
        .oneshot(authed("GET", "/todos", "stale").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let failure: ApiFailure = body_json(resp).await;
    assert_eq!(failure.error, "token expired");
}

#[tokio::test]
async fn refresh_rotates_access_token() {
    use tower::Service;

    let mut app = app(AuthConfig::default()).into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"refresh_token":"dev-refresh-token"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed: RefreshResponse = body_json(resp).await;
    assert_ne!(refreshed.access_token, TOKEN);

    // the old token is no longer accepted
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/todos"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // the new one is
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            authed("GET", "/todos", &refreshed.access_token)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_with_wrong_token_returns_401() {
    let resp = app(AuthConfig::default())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"refresh_token":"nope"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- list ---

#[tokio::test]
async fn list_todos_empty() {
    let resp = app(AuthConfig::default())
        .oneshot(empty_request("GET", "/todos"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}

// --- create ---

#[tokio::test]
async fn create_todo_returns_201() {
    let resp = app(AuthConfig::default())
        .oneshot(json_request("POST", "/todos", r#"{"content":"Buy milk"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let todo: Todo = body_json(resp).await;
    assert_eq!(todo.content, "Buy milk");
    assert!(!todo.completed);
}

#[tokio::test]
async fn create_todo_malformed_json_returns_422() {
    let resp = app(AuthConfig::default())
        .oneshot(json_request("POST", "/todos", r#"{"not_content":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_todo_not_found() {
    let resp = app(AuthConfig::default())
        .oneshot(empty_request(
            "GET",
            "/todos/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let failure: ApiFailure = body_json(resp).await;
    assert_eq!(failure.error, "todo not found");
}

#[tokio::test]
async fn get_todo_bad_uuid_returns_400() {
    let resp = app(AuthConfig::default())
        .oneshot(empty_request("GET", "/todos/not-a-uuid"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- replace / update / delete ---

#[tokio::test]
async fn replace_todo_not_found() {
    let resp = app(AuthConfig::default())
        .oneshot(json_request(
            "PUT",
            "/todos/00000000-0000-0000-0000-000000000000",
            r#"{"content":"Nope","completed":false}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_todo_not_found() {
    let resp = app(AuthConfig::default())
        .oneshot(empty_request(
            "DELETE",
            "/todos/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app(AuthConfig::default()).into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/todos", r#"{"content":"Walk dog"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Todo = body_json(resp).await;
    assert_eq!(created.content, "Walk dog");
    let id = created.id;

    // patch: only completed
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PATCH",
            &format!("/todos/{id}"),
            r#"{"completed":true}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Todo = body_json(resp).await;
    assert_eq!(updated.content, "Walk dog");
    assert!(updated.completed);

    // put: replaces every field
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/todos/{id}"),
            r#"{"content":"Walk cat","completed":false}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let replaced: Todo = body_json(resp).await;
    assert_eq!(replaced.content, "Walk cat");
    assert!(!replaced.completed);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/todos/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched, replaced);

    // delete returns the removed todo
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/todos/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let removed: Todo = body_json(resp).await;
    assert_eq!(removed.id, id);

    // list after delete: empty
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/todos"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}
