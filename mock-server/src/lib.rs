use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: Uuid,
    pub content: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub content: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct ReplaceTodo {
    pub content: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub content: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Body of every 401 and 404 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFailure {
    pub error: String,
}

/// Tokens the server starts with.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub access_token: String,
    pub refresh_token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: "dev-access-token".to_string(),
            refresh_token: "dev-refresh-token".to_string(),
        }
    }
}

impl AuthConfig {
    /// Read `ACCESS_TOKEN` and `REFRESH_TOKEN`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            access_token: std::env::var("ACCESS_TOKEN").unwrap_or(defaults.access_token),
            refresh_token: std::env::var("REFRESH_TOKEN").unwrap_or(defaults.refresh_token),
        }
    }
}

pub struct AppState {
    todos: RwLock<HashMap<Uuid, Todo>>,
    access_token: RwLock<String>,
    refresh_token: String,
}

pub type SharedState = Arc<AppState>;

type Rejection = (StatusCode, Json<ApiFailure>);

fn reject(status: StatusCode, error: &str) -> Rejection {
    (
        status,
        Json(ApiFailure {
            error: error.to_string(),
        }),
    )
}

pub fn app(auth: AuthConfig) -> Router {
    let state = Arc::new(AppState {
        todos: RwLock::new(HashMap::new()),
        access_token: RwLock::new(auth.access_token),
        refresh_token: auth.refresh_token,
    });
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo)
                .put(replace_todo)
                .patch(update_todo)
                .delete(delete_todo),
        )
        .route("/auth/refresh", post(refresh))
        .with_state(state)
}

pub async fn run(listener: TcpListener, auth: AuthConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(auth)).await
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Rejection> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
    if presented != state.access_token.read().await.as_str() {
        debug!("rejecting stale access token");
        return Err(reject(StatusCode::UNAUTHORIZED, "token expired"));
    }
    Ok(())
}

async fn refresh(
    State(state): State<SharedState>,
    Json(input): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, Rejection> {
    if input.refresh_token != state.refresh_token {
        return Err(reject(StatusCode::UNAUTHORIZED, "invalid refresh token"));
    }
    let access_token = Uuid::new_v4().to_string();
    *state.access_token.write().await = access_token.clone();
    info!("access token rotated");
    Ok(Json(RefreshResponse { access_token }))
}

async fn list_todos(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Todo>>, Rejection> {
    authorize(&state, &headers).await?;
    let todos = state.todos.read().await;
    Ok(Json(todos.values().cloned().collect()))
}

async fn create_todo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), Rejection> {
    authorize(&state, &headers).await?;
    let todo = Todo {
        id: Uuid::new_v4(),
        content: input.content,
        completed: input.completed,
    };
    state.todos.write().await.insert(todo.id, todo.clone());
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, Rejection> {
    authorize(&state, &headers).await?;
    let todos = state.todos.read().await;
    todos
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "todo not found"))
}

async fn replace_todo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<ReplaceTodo>,
) -> Result<Json<Todo>, Rejection> {
    authorize(&state, &headers).await?;
    let mut todos = state.todos.write().await;
    let todo = todos
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "todo not found"))?;
    todo.content = input.content;
    todo.completed = input.completed;
    Ok(Json(todo.clone()))
}

async fn update_todo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, Rejection> {
    authorize(&state, &headers).await?;
    let mut todos = state.todos.write().await;
    let todo = todos
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "todo not found"))?;
    if let Some(content) = input.content {
        todo.content = content;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    Ok(Json(todo.clone()))
}

async fn delete_todo(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, Rejection> {
    authorize(&state, &headers).await?;
    let mut todos = state.todos.write().await;
    todos
        .remove(&id)
        .map(Json)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "todo not found"))
}
