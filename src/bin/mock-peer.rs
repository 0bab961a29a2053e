//! Local stand-in for the peer service and weather feed.
//!
//! Serves an in-memory user collection and random weather, failing a
//! configurable share of requests with 503 so the worker's retries and
//! breakers can be watched in action.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_poller::clients::{weather, NewUser, User, WeatherReport};
use resilient_poller::lifecycle::signals;

#[derive(Parser)]
#[command(name = "mock-peer")]
#[command(about = "In-memory peer service and weather feed for local demos", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 7000)]
    port: u16,

    /// Share of requests answered with 503, between 0.0 and 1.0
    #[arg(short, long, default_value_t = 0.0)]
    failure_rate: f64,
}

struct MockState {
    users: RwLock<Vec<User>>,
    next_id: AtomicU64,
    failure_rate: f64,
}

type SharedState = Arc<MockState>;

impl MockState {
    fn seeded(failure_rate: f64) -> Self {
        let users = [
            (1, "John Doe", "john@example.com"),
            (2, "Jane Smith", "jane@example.com"),
            (3, "Bob Johnson", "bob@example.com"),
        ]
        .into_iter()
        .map(|(id, name, email)| User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: None,
        })
        .collect();

        Self {
            users: RwLock::new(users),
            next_id: AtomicU64::new(4),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Roll for an injected failure.
    fn injected_failure(&self) -> Option<Response> {
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            tracing::warn!("Injecting failure");
            return Some((StatusCode::SERVICE_UNAVAILABLE, "injected failure").into_response());
        }
        None
    }
}

async fn list_users(State(state): State<SharedState>) -> Response {
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    Json(state.users.read().await.clone()).into_response()
}

async fn get_user(State(state): State<SharedState>, Path(id): Path<u64>) -> Response {
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    let users = state.users.read().await;
    match users.iter().find(|u| u.id == id) {
        Some(user) => Json(user.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_user(State(state): State<SharedState>, Json(new_user): Json<NewUser>) -> Response {
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    if new_user.name.trim().is_empty() || new_user.email.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "name and email are required").into_response();
    }

    let user = User {
        id: state.next_id.fetch_add(1, Ordering::Relaxed),
        name: new_user.name,
        email: new_user.email,
        created_at: Some(rfc3339_now()),
    };
    tracing::info!(user_id = user.id, "Created user");
    state.users.write().await.push(user.clone());
    (StatusCode::CREATED, Json(user)).into_response()
}

/// Current UTC time as RFC 3339, e.g. `2024-05-01T12:00:00Z`.
fn rfc3339_now() -> String {
    let secs = std::time::UNIX_EPOCH.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    rfc3339(secs)
}

fn rfc3339(unix_secs: u64) -> String {
    let days = (unix_secs / 86_400) as i64;
    let rem = unix_secs % 86_400;

    // Civil date from days since 1970-01-01 (Howard Hinnant's algorithm).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        rem / 3_600,
        rem % 3_600 / 60,
        rem % 60
    )
}

#[derive(Deserialize)]
struct CityQuery {
    city: String,
}

async fn current_weather(State(state): State<SharedState>, Query(query): Query<CityQuery>) -> Response {
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    let data = weather::synthesize(&query.city);
    Json(WeatherReport {
        location: data.location,
        temperature: data.temperature,
        description: data.description,
        humidity: data.humidity,
        pressure: data.pressure,
    })
    .into_response()
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/user", get(list_users).post(create_user))
        .route("/api/user/{id}", get(get_user))
        .route("/current", get(current_weather))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_peer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let state = Arc::new(MockState::seeded(args.failure_rate));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, failure_rate = state.failure_rate, "Mock peer listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(signals::wait_for_signal())
        .await?;
    Ok(())
}
