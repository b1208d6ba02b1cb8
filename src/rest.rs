use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::db::{Store, StoreError};
use crate::models::{Envelope, NewBook, NewUser};

/// Application state shared across handlers. The store is injected here
/// rather than living in a process-wide global.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

/// Wire each repository operation to its method+path pair under the /api
/// group. The registration route is only mounted when enabled in config.
pub fn router(state: AppState, user_registration: bool) -> Router {
    let mut api = Router::new()
        .route("/create_books", post(create_book))
        .route("/books", get(list_books))
        .route("/get_book/:id", get(get_book_by_id))
        .route("/delete_book/:id", delete(delete_book));

    if user_registration {
        api = api.route("/user/register", post(register_user));
    }

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn reply(status: StatusCode, message: &str) -> Response {
    (status, Json(Envelope::message(message))).into_response()
}

/// POST /api/create_books
async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Response {
    let Json(book) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            info!("POST /api/create_books - undecodable body: {rejection}");
            return reply(StatusCode::UNPROCESSABLE_ENTITY, "request failed");
        }
    };

    match state.store.insert_book(&book).await {
        Ok(id) => {
            info!("created book {id}");
            reply(StatusCode::CREATED, "book has been added")
        }
        Err(err) => {
            error!("could not create book: {err}");
            reply(StatusCode::BAD_REQUEST, "could not create book")
        }
    }
}

/// GET /api/books
async fn list_books(State(state): State<AppState>) -> Response {
    match state.store.list_books().await {
        Ok(books) => (
            StatusCode::OK,
            Json(Envelope::with_data("books fetched successfully", books)),
        )
            .into_response(),
        Err(err) => {
            error!("could not list books: {err}");
            reply(StatusCode::BAD_REQUEST, "could not get the books")
        }
    }
}

/// GET /api/get_book/:id
async fn get_book_by_id(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => {
            info!("GET /api/get_book - non-numeric id: {rejection}");
            return reply(StatusCode::BAD_REQUEST, "invalid book id");
        }
    };

    match state.store.get_book(id).await {
        Ok(book) => (
            StatusCode::OK,
            Json(Envelope::with_data("book fetched successfully", book)),
        )
            .into_response(),
        Err(StoreError::NotFound) => reply(StatusCode::NOT_FOUND, "book not found"),
        Err(err) => {
            error!("could not get book {id}: {err}");
            reply(StatusCode::BAD_REQUEST, "could not get the book")
        }
    }
}

/// DELETE /api/delete_book/:id
async fn delete_book(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => {
            info!("DELETE /api/delete_book - non-numeric id: {rejection}");
            return reply(StatusCode::BAD_REQUEST, "invalid book id");
        }
    };

    match state.store.delete_book(id).await {
        Ok(()) => reply(StatusCode::OK, "book deleted successfully"),
        Err(StoreError::NotFound) => reply(StatusCode::NOT_FOUND, "book not found"),
        Err(err) => {
            error!("could not delete book {id}: {err}");
            reply(StatusCode::BAD_REQUEST, "could not delete the book")
        }
    }
}

/// POST /api/user/register
async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Response {
    let Json(user) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            info!("POST /api/user/register - undecodable body: {rejection}");
            return reply(StatusCode::UNPROCESSABLE_ENTITY, "request failed");
        }
    };

    if user.email.as_deref().map_or(true, str::is_empty) {
        return reply(StatusCode::NOT_ACCEPTABLE, "email is missing");
    }

    // Plaintext never reaches the store.
    let password_hash = match user.password.as_deref().filter(|p| !p.is_empty()) {
        Some(plain) => match hash_password(plain) {
            Ok(hash) => Some(hash),
            Err(err) => {
                error!("could not hash password: {err}");
                return reply(StatusCode::INTERNAL_SERVER_ERROR, "could not register user");
            }
        },
        None => None,
    };

    match state.store.insert_user(&user, password_hash.as_deref()).await {
        Ok(id) => {
            info!("registered user {id}");
            reply(StatusCode::CREATED, "user registered successfully")
        }
        Err(StoreError::Conflict) => reply(StatusCode::CONFLICT, "email is already registered"),
        Err(err) => {
            error!("could not register user: {err}");
            reply(StatusCode::BAD_REQUEST, "could not register user")
        }
    }
}

fn hash_password(plain: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}
