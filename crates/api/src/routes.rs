//! Route handlers and shared application state.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use paydesk_core::error::ClaimError;
use paydesk_core::models::{ClaimOutcome, Transfer};
use paydesk_core::services::ClaimService;

use crate::auth::{Authenticator, Claimant};

/// Default and maximum page sizes for the unclaimed list.
const DEFAULT_UNCLAIMED_LIMIT: u32 = 50;
const MAX_UNCLAIMED_LIMIT: u32 = 200;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub claims: Arc<ClaimService>,
    pub authenticator: Arc<dyn Authenticator>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/transfers/:identity/claim", post(claim))
        .route("/api/transfers/unclaimed", get(unclaimed))
        .route("/api/claims", get(claims_for_day))
        .route("/health", get(health))
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Claim a transfer for the authenticated operator.
///
/// 200 on win or idempotent self-retry, 409 naming the true owner on a
/// lost race, 404 for an unknown identity. A conflict is a business
/// outcome: it is never logged as an error.
async fn claim(
    State(state): State<AppState>,
    Claimant(claimant): Claimant,
    Path(identity): Path<String>,
) -> Response {
    match state.claims.claim(&identity, &claimant).await {
        Ok(outcome) => {
            let status = if outcome.is_success() {
                StatusCode::OK
            } else {
                StatusCode::CONFLICT
            };
            (status, Json(outcome)).into_response()
        }
        Err(ClaimError::NotFound(identity)) => {
            debug!(%identity, "Claim against unknown transfer");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: format!("transfer not found: {identity}"),
                }),
            )
                .into_response()
        }
        Err(ClaimError::Storage(e)) => {
            error!(error = ?e, "Claim failed on storage");
            storage_unavailable()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnclaimedParams {
    limit: Option<u32>,
}

/// Transfers nobody has claimed yet, most recent first.
async fn unclaimed(
    State(state): State<AppState>,
    Claimant(_): Claimant,
    Query(params): Query<UnclaimedParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_UNCLAIMED_LIMIT)
        .min(MAX_UNCLAIMED_LIMIT);

    match state.claims.list_unclaimed(limit).await {
        Ok(transfers) => Json(transfers).into_response(),
        Err(e) => {
            error!(error = ?e, "Unclaimed query failed");
            storage_unavailable()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsParams {
    date: NaiveDate,
    /// Defaults to the authenticated identity.
    claimant: Option<String>,
}

#[derive(Debug, Serialize)]
struct DayClaimsBody {
    claimant: String,
    date: NaiveDate,
    total: Decimal,
    claims: Vec<ClaimBody>,
}

#[derive(Debug, Serialize)]
struct ClaimBody {
    claimed_at: DateTime<Utc>,
    transfer: Transfer,
}

/// One claimant's claims on a civil date, with the running total.
async fn claims_for_day(
    State(state): State<AppState>,
    Claimant(identity): Claimant,
    Query(params): Query<ClaimsParams>,
) -> Response {
    let claimant = params.claimant.unwrap_or(identity);

    match state.claims.claims_for_day(&claimant, params.date).await {
        Ok(day) => Json(DayClaimsBody {
            claimant,
            date: params.date,
            total: day.total,
            claims: day
                .claims
                .into_iter()
                .map(|c| ClaimBody {
                    claimed_at: c.claimed_at,
                    transfer: c.transfer,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => {
            error!(error = ?e, "Claims-by-day query failed");
            storage_unavailable()
        }
    }
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Error Shaping
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn storage_unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "storage unavailable, retry shortly".to_string(),
        }),
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use chrono::FixedOffset;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use paydesk_core::testing::InMemoryRepositories;

    /// Any username/password pair where password == "pw" is accepted.
    struct TestAuthenticator;

    #[async_trait]
    impl Authenticator for TestAuthenticator {
        async fn authenticate(&self, username: &str, password: &str) -> Option<String> {
            (password == "pw").then(|| username.to_string())
        }
    }

    async fn app() -> (Router, Arc<InMemoryRepositories>) {
        let repos = Arc::new(InMemoryRepositories::new());
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let state = AppState {
            claims: Arc::new(ClaimService::new(repos.clone(), offset)),
            authenticator: Arc::new(TestAuthenticator),
        };
        (router(state), repos)
    }

    fn authed(method: &str, uri: &str, user: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "authorization",
                format!("Basic {}", BASE64.encode(format!("{user}:pw"))),
            )
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn claim_win_then_conflict_then_idempotent_retry() {
        let (app, repos) = app().await;
        let id = repos
            .seed_transfer(1, "139322351059", Utc::now(), Decimal::new(1000, 2))
            .await;

        let win = app
            .clone()
            .oneshot(authed("POST", &format!("/api/transfers/{id}/claim"), "Banfield"))
            .await
            .unwrap();
        assert_eq!(win.status(), StatusCode::OK);
        assert_eq!(body_json(win).await["owner"], "Banfield");

        let conflict = app
            .clone()
            .oneshot(authed("POST", &format!("/api/transfers/{id}/claim"), "Adrogue"))
            .await
            .unwrap();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        // The loser is always told who actually owns the claim.
        assert_eq!(body_json(conflict).await["owner"], "Banfield");

        let retry = app
            .clone()
            .oneshot(authed("POST", &format!("/api/transfers/{id}/claim"), "Banfield"))
            .await
            .unwrap();
        assert_eq!(retry.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_transfer_is_404() {
        let (app, _repos) = app().await;
        let response = app
            .oneshot(authed("POST", "/api/transfers/999999/claim", "Banfield"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_or_bad_credentials_are_401() {
        let (app, repos) = app().await;
        let id = repos
            .seed_transfer(1, "1", Utc::now(), Decimal::ONE)
            .await;

        let missing = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/transfers/{id}/claim"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let bad = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/transfers/{id}/claim"))
                    .header(
                        "authorization",
                        format!("Basic {}", BASE64.encode("Banfield:wrong")),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unclaimed_lists_newest_first_and_hides_claimed() {
        let (app, repos) = app().await;
        let older: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let newer: DateTime<Utc> = "2024-05-01T11:00:00Z".parse().unwrap();
        let a = repos.seed_transfer(1, "a", older, Decimal::ONE).await;
        let _b = repos.seed_transfer(1, "b", newer, Decimal::TWO).await;

        // Claim the older one; only the newer should remain.
        app.clone()
            .oneshot(authed("POST", &format!("/api/transfers/{a}/claim"), "Banfield"))
            .await
            .unwrap();

        let response = app
            .oneshot(authed("GET", "/api/transfers/unclaimed?limit=10", "Banfield"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["provider_id"], "b");
    }

    #[tokio::test]
    async fn claims_by_day_totals_for_authenticated_identity() {
        let (app, repos) = app().await;
        let a = repos
            .seed_transfer(1, "a", Utc::now(), Decimal::new(1050, 2))
            .await;
        let b = repos
            .seed_transfer(1, "b", Utc::now(), Decimal::new(2000, 2))
            .await;

        for id in [a, b] {
            app.clone()
                .oneshot(authed("POST", &format!("/api/transfers/{id}/claim"), "Banfield"))
                .await
                .unwrap();
        }

        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let today = Utc::now().with_timezone(&offset).date_naive();
        let response = app
            .oneshot(authed("GET", &format!("/api/claims?date={today}"), "Banfield"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["claimant"], "Banfield");
        assert_eq!(body["claims"].as_array().unwrap().len(), 2);
        assert_eq!(body["total"], "30.50");
    }

    #[tokio::test]
    async fn health_is_open() {
        let (app, _repos) = app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
