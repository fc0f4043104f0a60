use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use maud::Markup;
use santa_core::{generate_with_thread_rng, Rejection};
use serde::Deserialize;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, Span};

pub mod admin;
pub mod config;
pub mod error;
pub mod reveal;
pub mod store;
pub mod views;

use admin::AdminController;
use config::Settings;
use error::AppError;
use reveal::{Gatekeeper, RevealError};
use store::{Store, StoreError};
use views::PersonView;

#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    store: Arc<Store>,
}

impl AppState {
    pub fn new(settings: Settings, store: Store) -> Self {
        Self {
            settings: Arc::new(settings),
            store: Arc::new(store),
        }
    }

    /// Opens (or creates) the database named in `settings`.
    pub async fn open(settings: Settings) -> Result<Self, StoreError> {
        let store = Store::open(&settings.db_path).await?;
        Ok(Self::new(settings, store))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Draws once, the first time anybody needs a draw.
    pub async fn ensure_assignment(&self) -> Result<(), AppError> {
        let settings = &self.settings;
        let created = self
            .store
            .ensure_assignment(|| {
                generate_with_thread_rng(&settings.roster, &settings.forbidden)
                    .map_err(AppError::from)
            })
            .await?;
        if created {
            tracing::info!(participants = settings.roster.len(), "initial draw stored");
        }
        Ok(())
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/reveal", post(reveal))
        .route("/admin", get(admin_view))
        .route("/admin/reset", post(admin_reset))
        .route("/healthz", get(healthz))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Spans carry the path only: `/admin?key=` must never reach the logs.
fn request_span(req: &Request) -> Span {
    tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
}

fn flash_code(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::InvalidName => "invalid_name",
        Rejection::AlreadyRevealed => "already_revealed",
        Rejection::BadPin => "bad_pin",
        Rejection::MissingAssignment => "missing_assignment",
    }
}

fn flash_message(code: &str) -> Option<&'static str> {
    match code {
        "invalid_name" => Some("Invalid name."),
        "already_revealed" => Some("That name has already been used to see the result."),
        "bad_pin" => Some("Incorrect PIN."),
        _ => None,
    }
}

#[derive(Deserialize)]
struct IndexParams {
    error: Option<String>,
}

async fn index(
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<Markup, AppError> {
    state.ensure_assignment().await?;

    let revealed = state.store.revealed_givers().await?;
    let people: Vec<PersonView> = state
        .settings
        .roster
        .names()
        .iter()
        .map(|name| PersonView {
            name: name.clone(),
            disabled: revealed.contains(name),
        })
        .collect();
    let flash = params.error.as_deref().and_then(flash_message);

    Ok(views::index(&people, state.settings.pins.required, flash))
}

#[derive(Deserialize)]
struct RevealForm {
    #[serde(default)]
    giver: String,
    #[serde(default)]
    pin: String,
}

async fn reveal(
    State(state): State<AppState>,
    Form(form): Form<RevealForm>,
) -> Result<Response, AppError> {
    let gate = Gatekeeper::new(&state.settings, &state.store);
    match gate.reveal(&form.giver, &form.pin).await {
        Ok(revealed) => {
            tracing::info!(giver = %revealed.giver, "receiver revealed");
            Ok(views::reveal(&revealed.giver, &revealed.receiver).into_response())
        }
        Err(RevealError::Rejected(rejection)) if !rejection.is_internal() => {
            tracing::info!(giver = %form.giver.trim(), %rejection, "reveal rejected");
            Ok(Redirect::to(&format!("/?error={}", flash_code(rejection))).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Deserialize)]
struct AdminParams {
    #[serde(default)]
    key: String,
}

async fn admin_view(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> Result<Markup, AppError> {
    let overview = AdminController::new(&state.settings, &state.store)
        .overview(&params.key)
        .await?;
    Ok(views::admin(&overview, &params.key))
}

#[derive(Deserialize)]
struct ResetForm {
    #[serde(default)]
    admin_key: String,
}

async fn admin_reset(
    State(state): State<AppState>,
    Form(form): Form<ResetForm>,
) -> Result<Redirect, AppError> {
    AdminController::new(&state.settings, &state.store)
        .reset(&form.admin_key)
        .await?;
    Ok(Redirect::to("/"))
}

async fn healthz() -> &'static str {
    "ok"
}
