// handlers/mod.rs - Two-tier handler layout
//
// Public (no bearer needed) → Protected (principal resolved from bearer, policy-checked per row)
pub mod protected; // /api/*
pub mod public; // /auth/*

use uuid::Uuid;

use crate::error::ApiError;

/// Parse a path id, rejecting junk before it reaches a service
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::bad_request(format!("'{}' is not a valid id", raw)))
}
