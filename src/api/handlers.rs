use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cluster::RoleElector;
use crate::data::{
    relative_time, AlertRecord, CheckIn, CheckOut, NewReservation, Reservation,
    ReservationFilter, Snooze, TimeUnit,
};
use crate::monitor::fails_sla;
use crate::store::{Store, StoreError};

/// Shortest deadline a reservation may register with
pub const MIN_FREQUENCY_SECS: i64 = 10;

const DEFAULT_ALERT_LIMIT: usize = 100;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub elector: Arc<dyn RoleElector>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Peers compare the body against the literal `true`
pub async fn is_coordinator(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = if state.elector.is_coordinator() {
        "true"
    } else {
        "false"
    };
    ([(header::CONTENT_TYPE, "text/plain")], body)
}

// ============================================================================
// Reservations
// ============================================================================

/// Registration body. Units are checked here; stored rows are read leniently.
#[derive(Deserialize)]
pub struct ReservationRequest {
    pub app: String,
    pub component: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub notify: String,
    #[serde(default, alias = "alert_msg")]
    pub alert_message: String,
    pub frequency: i64,
    pub time_units: String,
}

impl ReservationRequest {
    fn validate(self) -> Result<NewReservation, ApiError> {
        if self.app.trim().is_empty() || self.component.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "app and component are required".to_string(),
            ));
        }
        let unit = parse_units(&self.time_units)?;
        if unit.to_seconds(self.frequency) < MIN_FREQUENCY_SECS {
            return Err(ApiError::BadRequest(format!(
                "Frequency must be at least {} seconds",
                MIN_FREQUENCY_SECS
            )));
        }

        Ok(NewReservation::new(self.app, self.component, self.frequency, unit)
            .with_owner(self.owner)
            .with_notify(self.notify)
            .with_alert_message(self.alert_message))
    }
}

fn parse_units(units: &str) -> Result<TimeUnit, ApiError> {
    TimeUnit::from_api(units).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid time_units [{}], expected seconds, minutes or hours",
            units
        ))
    })
}

pub async fn make_reservation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let reservation = request.validate()?;
    state
        .store
        .store_reservation(&reservation, Utc::now().timestamp())
        .await?;

    tracing::info!(
        app = %reservation.app,
        component = %reservation.component,
        frequency = reservation.frequency,
        time_units = %reservation.time_units,
        "Reservation stored"
    );
    Ok(MessageResponse::ok(format!(
        "Reservation stored [{}/{}]",
        reservation.app, reservation.component
    )))
}

#[derive(Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub last_checkin_str: String,
    pub time_since_last_checkin: String,
    pub failing_sla: bool,
}

impl ReservationView {
    fn new(reservation: Reservation, now: i64) -> Self {
        let last_checkin_str = DateTime::<Utc>::from_timestamp(reservation.last_checkin, 0)
            .map(|t| t.to_rfc2822())
            .unwrap_or_default();
        Self {
            last_checkin_str,
            time_since_last_checkin: relative_time(reservation.last_checkin, now),
            failing_sla: fails_sla(&reservation, now),
            reservation,
        }
    }
}

#[derive(Serialize)]
pub struct ReservationsResponse {
    pub success: bool,
    pub result: Vec<ReservationView>,
}

pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReservationsResponse>, ApiError> {
    let mut reservations = state.store.list_reservations(&ReservationFilter::All).await?;
    reservations.sort_by(|a, b| b.last_checkin.cmp(&a.last_checkin));

    let now = Utc::now().timestamp();
    Ok(Json(ReservationsResponse {
        success: true,
        result: reservations
            .into_iter()
            .map(|r| ReservationView::new(r, now))
            .collect(),
    }))
}

// ============================================================================
// Check-in / Check-out / Snooze
// ============================================================================

pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Json(checkin): Json<CheckIn>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = Utc::now().timestamp();
    if !state
        .store
        .check_in(&checkin.app, &checkin.component, now)
        .await?
    {
        return Err(not_registered(&checkin.app, &checkin.component));
    }
    state.store.log_housekeeping(&checkin, now).await?;

    tracing::info!(app = %checkin.app, component = %checkin.component, "Checked in");
    Ok(MessageResponse::ok(format!(
        "Application checked in: {}",
        checkin.app
    )))
}

pub async fn check_out(
    State(state): State<Arc<AppState>>,
    Json(checkout): Json<CheckOut>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state
        .store
        .check_out(&checkout.app, &checkout.component)
        .await?
    {
        return Err(not_registered(&checkout.app, &checkout.component));
    }

    tracing::info!(app = %checkout.app, component = %checkout.component, "Checked out");
    Ok(MessageResponse::ok(format!(
        "Application removed [{}/{}]",
        checkout.app, checkout.component
    )))
}

pub async fn snooze(
    State(state): State<Arc<AppState>>,
    Json(snooze): Json<Snooze>,
) -> Result<Json<MessageResponse>, ApiError> {
    let unit = parse_units(&snooze.time_units)?;
    if snooze.duration <= 0 {
        return Err(ApiError::BadRequest(
            "Snooze duration must be positive".to_string(),
        ));
    }

    let until = Utc::now()
        .timestamp()
        .saturating_add(unit.to_seconds(snooze.duration));
    if !state
        .store
        .snooze(&snooze.app, &snooze.component, until)
        .await?
    {
        return Err(not_registered(&snooze.app, &snooze.component));
    }

    tracing::info!(
        app = %snooze.app,
        component = %snooze.component,
        until,
        "Alerting paused"
    );
    Ok(MessageResponse::ok(format!(
        "Application alerting paused: {}",
        snooze.app
    )))
}

fn not_registered(app: &str, component: &str) -> ApiError {
    ApiError::NotFound(format!("No reservation for [{}/{}]", app, component))
}

// ============================================================================
// Alert History
// ============================================================================

#[derive(Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    pub success: bool,
    pub result: Vec<AlertRecord>,
}

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    let result = state.store.list_alerts(limit).await?;
    Ok(Json(AlertsResponse {
        success: true,
        result,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store failure while serving request");
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
