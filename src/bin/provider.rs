//! Mock provider for local runs of the consumer.
//!
//! Serves `GET /hello`, `GET /users/{id}` and `GET /users?ids=` from a fixed
//! user table. `--fail-rate` and `--delay-ms` inject faults.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use ribbon_consumer::config::ObservabilityConfig;
use ribbon_consumer::http::handlers::parse_ids;
use ribbon_consumer::http::server::shutdown_signal;
use ribbon_consumer::observability::logging;
use ribbon_consumer::service::User;

#[derive(Debug, Parser)]
#[command(name = "provider", about = "Mock provider service")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8081")]
    bind: SocketAddr,

    /// Fraction of requests answered with 500 (0.0 to 1.0).
    #[arg(long, default_value_t = 0.0)]
    fail_rate: f64,

    /// Latency added before every response.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

struct Provider {
    users: BTreeMap<i64, User>,
    fail_rate: f64,
    delay: Duration,
}

impl Provider {
    fn new(fail_rate: f64, delay: Duration) -> Self {
        let users = [(1, "alice"), (2, "bob"), (3, "carol"), (4, "dave")]
            .into_iter()
            .map(|(id, name)| (id, User::new(id, name)))
            .collect();
        Self {
            users,
            fail_rate: fail_rate.clamp(0.0, 1.0),
            delay,
        }
    }

    /// Apply the configured delay, then maybe fail.
    async fn inject(&self) -> Result<(), Response> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_rate > 0.0 && rand::thread_rng().gen_bool(self.fail_rate) {
            tracing::debug!("Injecting failure");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct IdsQuery {
    #[serde(default)]
    ids: String,
}

async fn hello(State(provider): State<Arc<Provider>>) -> Response {
    if let Err(failure) = provider.inject().await {
        return failure;
    }
    "Hello from the provider".into_response()
}

async fn user(State(provider): State<Arc<Provider>>, Path(id): Path<i64>) -> Response {
    if let Err(failure) = provider.inject().await {
        return failure;
    }
    match provider.users.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("no user {}", id)).into_response(),
    }
}

/// Known users among `ids`, in request order; unknown ids are omitted.
async fn users(State(provider): State<Arc<Provider>>, Query(query): Query<IdsQuery>) -> Response {
    if let Err(failure) = provider.inject().await {
        return failure;
    }
    let ids = match parse_ids(&query.ids) {
        Ok(ids) => ids,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    tracing::info!(ids = %query.ids, "Batch lookup");
    let found: Vec<User> = ids
        .iter()
        .filter_map(|id| provider.users.get(id).cloned())
        .collect();
    Json(found).into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&ObservabilityConfig::default());

    let provider = Arc::new(Provider::new(cli.fail_rate, Duration::from_millis(cli.delay_ms)));
    let app = Router::new()
        .route("/hello", get(hello))
        .route("/users", get(users))
        .route("/users/{id}", get(user))
        .with_state(provider)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        fail_rate = cli.fail_rate,
        delay_ms = cli.delay_ms,
        "Provider listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
