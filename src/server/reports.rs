use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use super::error::ApiResult;
use super::AppState;
use crate::reports::{self as repo, FinancialYearSummary, Period, SalesData};

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    period: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

pub async fn sales_data(
    State(state): State<AppState>,
    query: Result<Query<SalesQuery>, QueryRejection>,
) -> ApiResult<Json<SalesData>> {
    let Query(q) = query?;
    let period: Period = q.period.as_deref().unwrap_or("this-month").parse()?;
    let today = Local::now().date_naive();
    let data = state
        .with_conn(move |conn, _| repo::sales_data(conn, period, today, q.start_date, q.end_date))
        .await?;
    Ok(Json(data))
}

pub async fn financial_year_summary(
    State(state): State<AppState>,
) -> ApiResult<Json<FinancialYearSummary>> {
    let today = Local::now().date_naive();
    let summary = state
        .with_conn(move |conn, _| repo::financial_year_summary(conn, today))
        .await?;
    Ok(Json(summary))
}
