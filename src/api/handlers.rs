//! REST API handlers for the registrations dashboard
//!
//! These handlers use the shared AnalyticsService.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::service::{AnalyticsService, IngestReport, RegistrationQuery, RegistrationsReport};
use crate::category_names::lookup_category;
use crate::error::{QueryError, ServiceError};
use crate::models::{Dimension, Insight};
use crate::period::Granularity;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct RegistrationsResponse {
    pub status: &'static str,
    pub data: RegistrationsReport,
    pub filters: RegistrationParams,
}

#[derive(Serialize)]
pub struct InsightsResponse {
    pub status: &'static str,
    pub data: Vec<Insight>,
}

#[derive(Serialize)]
pub struct ManufacturersResponse {
    pub status: &'static str,
    pub manufacturers: Vec<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub message: String,
    pub report: IngestReport,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message.into() }))
}

fn service_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::Query(_) | ServiceError::OutsidePeriod(_) => StatusCode::BAD_REQUEST,
        ServiceError::NoDataSource => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query string of `GET /api/registrations`. List parameters are comma separated.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RegistrationParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    pub manufacturers: Option<String>,
    pub regions: Option<String>,
    pub group_by: Option<String>,
    pub granularity: Option<String>,
}

impl RegistrationParams {
    pub fn to_query(&self) -> Result<RegistrationQuery, String> {
        let categories = split_list(self.category.as_deref())
            .into_iter()
            .map(|label| {
                lookup_category(&label).ok_or_else(|| {
                    QueryError::UnknownDimensionValue {
                        dimension: Dimension::Category,
                        value: label,
                    }
                    .to_string()
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let group_by = match self.group_by.as_deref() {
            Some(s) => Some(Dimension::parse(s).ok_or_else(|| format!("unknown group_by {:?}", s))?),
            None => None,
        };
        let granularity = match self.granularity.as_deref() {
            Some(s) => Granularity::parse(s).ok_or_else(|| format!("unknown granularity {:?}", s))?,
            None => Granularity::default(),
        };

        Ok(RegistrationQuery {
            start_date: parse_param_date("start_date", self.start_date.as_deref())?,
            end_date: parse_param_date("end_date", self.end_date.as_deref())?,
            categories,
            manufacturers: split_list(self.manufacturers.as_deref()),
            regions: split_list(self.regions.as_deref()),
            group_by,
            granularity,
        })
    }
}

fn split_list(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_param_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("invalid {} {:?}, expected YYYY-MM-DD", name, v)),
        None => Ok(None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<AnalyticsService>;

/// GET /
pub async fn root(State(service): State<AppState>) -> impl IntoResponse {
    let endpoints = serde_json::json!({
        "registrations": "/api/registrations",
        "insights": "/api/insights",
        "manufacturers": "/api/manufacturers",
        "refresh": "/api/refresh-data",
    });

    match service.stats().await {
        Ok(stats) => Json(serde_json::json!({
            "status": "healthy",
            "service": "Vehicle Registration Analytics API",
            "version": env!("CARGO_PKG_VERSION"),
            "data_source": service.source_description(),
            "data_status": {
                "category_registrations": stats.category_rows,
                "manufacturer_registrations": stats.manufacturer_rows,
                "first_data_date": stats.first_date,
                "latest_data_date": stats.latest_date,
            },
            "endpoints": endpoints,
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            Json(serde_json::json!({
                "status": "degraded",
                "service": "Vehicle Registration Analytics API",
                "error": e.to_string(),
            }))
        }
    }
}

/// GET /api/registrations
pub async fn get_registrations(
    State(service): State<AppState>,
    Query(params): Query<RegistrationParams>,
) -> Result<Json<RegistrationsResponse>, ApiError> {
    let query = params.to_query().map_err(bad_request)?;
    let data = service.get_registrations(&query).await.map_err(service_error)?;
    Ok(Json(RegistrationsResponse {
        status: "success",
        data,
        filters: params,
    }))
}

/// GET /api/insights
pub async fn get_insights(State(service): State<AppState>) -> Result<Json<InsightsResponse>, ApiError> {
    let insights = service.get_insights().await.map_err(service_error)?;
    Ok(Json(InsightsResponse {
        status: "success",
        data: insights.as_ref().clone(),
    }))
}

/// GET /api/manufacturers
pub async fn get_manufacturers(State(service): State<AppState>) -> Result<Json<ManufacturersResponse>, ApiError> {
    let manufacturers = service.get_manufacturers().await.map_err(service_error)?;
    Ok(Json(ManufacturersResponse {
        status: "success",
        manufacturers,
    }))
}

/// POST /api/refresh-data
pub async fn refresh_data(State(service): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    info!("Manual data refresh requested");
    let report = service.refresh().await.map_err(service_error)?;
    Ok(Json(RefreshResponse {
        status: "success",
        message: format!(
            "Ingested {} records across {} periods ({} rows rejected)",
            report.records_ingested,
            report.periods_replaced.len(),
            report.failures.len()
        ),
        report,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleCategory;

    #[test]
    fn test_params_to_query() {
        let params = RegistrationParams {
            start_date: Some("2024-01-01".to_string()),
            category: Some("two wheeler, 4W".to_string()),
            manufacturers: Some("Hero MotoCorp, TVS,".to_string()),
            granularity: Some("quarterly".to_string()),
            ..Default::default()
        };
        let query = params.to_query().unwrap();
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.end_date, None);
        assert_eq!(query.categories, vec![VehicleCategory::TwoWheeler, VehicleCategory::FourWheeler]);
        assert_eq!(query.manufacturers, vec!["Hero MotoCorp", "TVS"]);
        assert_eq!(query.granularity, Granularity::Quarter);
        assert_eq!(query.group_by, None);
    }

    #[test]
    fn test_bad_params_are_rejected() {
        let bad_date = RegistrationParams {
            end_date: Some("31/12/2024".to_string()),
            ..Default::default()
        };
        assert!(bad_date.to_query().unwrap_err().contains("end_date"));

        let bad_category = RegistrationParams {
            category: Some("Tractor".to_string()),
            ..Default::default()
        };
        assert!(bad_category.to_query().unwrap_err().contains("Tractor"));

        let bad_group = RegistrationParams {
            group_by: Some("colour".to_string()),
            ..Default::default()
        };
        assert!(bad_group.to_query().is_err());
    }
}
