//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, DistributionPlan, DomainError, FlexEvent, OperationContext, RecordedEvent};
use crate::engine::{AmortizationRow, StressForecast};
use crate::error::AppError;
use crate::service::{AccountSnapshot, FlexLimits, LoanSummary, MortgageAccountService};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    pub owner_id: Uuid,
    pub accounts: Vec<AccountSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct FlexRequest {
    /// Decimal string, e.g. "500.00"
    pub reduction_amount: String,
}

impl FlexRequest {
    fn amount(&self) -> Result<Amount, AppError> {
        self.reduction_amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct MaxFlexUsageRequest {
    pub max_flex_usage_per_year: u32,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    #[serde(default = "default_schedule_months")]
    pub months: u32,
}

fn default_schedule_months() -> u32 {
    12
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub account_id: Uuid,
    pub months: u32,
    pub rows: Vec<AmortizationRow>,
}

#[derive(Debug, Deserialize)]
pub struct StressQuery {
    #[serde(default)]
    pub horizon_months: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub account_id: Uuid,
    pub events: Vec<RecordedEvent>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<MortgageAccountService> {
    Router::new()
        .route("/mortgages", get(list_mortgages))
        .route("/mortgages/:account_id", get(get_mortgage))
        .route("/mortgages/:account_id/summary", get(get_summary))
        .route("/mortgages/:account_id/schedule", get(get_schedule))
        .route("/mortgages/:account_id/events", get(get_events))
        // Flex
        .route("/mortgages/:account_id/flex/limits", get(get_flex_limits))
        .route("/mortgages/:account_id/flex/calculate", post(calculate_flex))
        .route("/mortgages/:account_id/flex/apply", post(apply_flex))
        .route("/mortgages/:account_id/toggle-flex", put(toggle_flex))
        .route("/mortgages/:account_id/max-flex-usage", put(set_max_flex_usage))
        // Stress
        .route("/mortgages/:account_id/stress-forecast", get(get_stress_forecast))
}

// =========================================================================
// Accounts
// =========================================================================

/// List an owner's mortgages
async fn list_mortgages(
    State(service): State<MortgageAccountService>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<AccountsResponse>, AppError> {
    let accounts = service.list_accounts(query.owner_id).await?;

    Ok(Json(AccountsResponse {
        owner_id: query.owner_id,
        accounts: accounts.into_iter().map(AccountSnapshot::from).collect(),
    }))
}

/// Account snapshot by id
async fn get_mortgage(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account = service.get_account(account_id).await?;
    Ok(Json(account.into()))
}

async fn get_summary(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<LoanSummary>, AppError> {
    Ok(Json(service.summary(account_id).await?))
}

/// Upcoming payments from the current balance
async fn get_schedule(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let rows = service.schedule(account_id, query.months).await?;

    Ok(Json(ScheduleResponse {
        account_id,
        months: query.months,
        rows,
    }))
}

/// Committed transitions, oldest first
async fn get_events(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<EventsResponse>, AppError> {
    let events = service.events(account_id).await?;
    Ok(Json(EventsResponse { account_id, events }))
}

// =========================================================================
// Flex
// =========================================================================

async fn get_flex_limits(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<FlexLimits>, AppError> {
    Ok(Json(service.flex_limits(account_id).await?))
}

/// Preview a reduction. Read-only.
async fn calculate_flex(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<FlexRequest>,
) -> Result<Json<DistributionPlan>, AppError> {
    let plan = service
        .calculate_flex(account_id, request.amount()?)
        .await?;
    Ok(Json(plan))
}

async fn apply_flex(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<FlexRequest>,
) -> Result<(StatusCode, Json<FlexEvent>), AppError> {
    let flex_event = service
        .apply_flex(account_id, request.amount()?, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(flex_event)))
}

async fn toggle_flex(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account = service.toggle_flex(account_id, &context).await?;
    Ok(Json(account.into()))
}

async fn set_max_flex_usage(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<MaxFlexUsageRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account = service
        .set_max_flex_usage(account_id, request.max_flex_usage_per_year, &context)
        .await?;
    Ok(Json(account.into()))
}

// =========================================================================
// Stress
// =========================================================================

async fn get_stress_forecast(
    State(service): State<MortgageAccountService>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<StressQuery>,
) -> Result<Json<StressForecast>, AppError> {
    let forecast = service
        .stress_forecast(account_id, query.horizon_months)
        .await?;
    Ok(Json(forecast))
}
