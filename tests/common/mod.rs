//! Common test utilities

#![allow(dead_code)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

use flex_mortgage::aggregate::MortgageTerms;
use flex_mortgage::engine::IncomeExpenseMonth;
use flex_mortgage::repository::{AccountRepository, ForecastSource};
use flex_mortgage::{build_router, MortgageAccountService};

/// Accounts seeded by [`setup_app`]
pub struct TestAccounts {
    pub owner_id: Uuid,
    /// Flex on, no forecast data
    pub primary: Uuid,
    /// Flex on, three months of forecast at 70% expenses
    pub forecasted: Uuid,
}

/// 1,000,000 loan at 3.6% with 120 of 240 months left, paying 5000 a month
pub fn sample_terms(owner_id: Uuid, mortgage_number: &str) -> MortgageTerms {
    MortgageTerms {
        id: Uuid::new_v4(),
        owner_id,
        mortgage_number: mortgage_number.to_string(),
        original_principal: dec!(1000000),
        current_balance: dec!(480000),
        monthly_payment: dec!(5000),
        annual_interest_rate: dec!(0.036),
        origination_date: NaiveDate::from_ymd_opt(2016, 10, 1).unwrap(),
        maturity_date: NaiveDate::from_ymd_opt(2036, 10, 1).unwrap(),
        remaining_months: 120,
        flex_enabled: true,
        max_flex_usage_per_year: 3,
        flex_usage_count: 0,
        flex_usage_year: 2026,
    }
}

pub fn stressed_months(count: u32) -> Vec<IncomeExpenseMonth> {
    (1..=count)
        .map(|m| IncomeExpenseMonth {
            month: NaiveDate::from_ymd_opt(2026, 10 + (m - 1) % 3, 1).unwrap(),
            predicted_income: dec!(10000),
            predicted_expenses: dec!(7000),
        })
        .collect()
}

/// Build an in-memory service with two accounts for one owner
pub async fn setup_service() -> (MortgageAccountService, TestAccounts) {
    let owner_id = Uuid::new_v4();
    let primary = sample_terms(owner_id, "MTG-0001");
    let forecasted = sample_terms(owner_id, "MTG-0002");

    let accounts = TestAccounts {
        owner_id,
        primary: primary.id,
        forecasted: forecasted.id,
    };

    let forecasts = ForecastSource::from_map(HashMap::from([(forecasted.id, stressed_months(3))]));
    let service = MortgageAccountService::new(AccountRepository::in_memory(), forecasts);

    service.open_account(primary).await.unwrap();
    service.open_account(forecasted).await.unwrap();

    (service, accounts)
}

/// Build the full router over [`setup_service`]
pub async fn setup_app() -> (Router, TestAccounts) {
    let (service, accounts) = setup_service().await;
    (build_router(service), accounts)
}

/// Send a request and decode the JSON body (Null when empty or not JSON)
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Read a decimal string field
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .unwrap()
}
