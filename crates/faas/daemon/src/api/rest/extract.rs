//! Request extractors

use crate::error::ApiError;
use axum::extract::FromRequest;

/// JSON body whose rejections are reported as [`ApiError::Validation`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
