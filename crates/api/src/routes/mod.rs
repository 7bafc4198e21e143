//! HTTP route handlers and the state they share.

pub mod health;
pub mod invoices;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod tables;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{EmployeeId, Status};
use domain::RestaurantService;
use store::Store;

use crate::error::ApiError;

/// Header carrying the acting employee's identifier.
pub const EMPLOYEE_HEADER: &str = "x-employee-id";

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub service: RestaurantService<S>,
}

/// The employee performing a mutating request, taken from the `x-employee-id` header.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub EmployeeId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(EMPLOYEE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {EMPLOYEE_HEADER} header")))?;
        let raw = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {EMPLOYEE_HEADER} header")))?;
        Ok(Actor(EmployeeId::from_uuid(parse_uuid(raw, "employee")?)))
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}

fn parse_status(raw: &str) -> Result<Status, ApiError> {
    raw.parse()
        .map_err(|e: common::UnknownStatus| ApiError::BadRequest(e.to_string()))
}
