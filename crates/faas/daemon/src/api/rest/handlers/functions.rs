//! Function management handlers

use crate::api::rest::extract::ApiJson;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use faas_controller::{FunctionStore, StoreError, TriggerReason, UnitStore};
use faas_types::{ExecutionUnit, Function, FunctionSpec, ObjectMeta, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Create function request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunctionRequest {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: FunctionSpec,
}

/// Update function request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFunctionRequest {
    pub spec: FunctionSpec,
    /// Labels to replace; existing labels are kept when absent
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    /// Reject the update unless the stored version still matches
    #[serde(default)]
    pub resource_version: Option<u64>,
}

/// Delete function response
#[derive(Debug, Serialize)]
pub struct DeleteFunctionResponse {
    pub deleted: bool,
}

/// List Functions in every namespace
pub async fn list_all_functions(State(state): State<AppState>) -> ApiResult<Json<Vec<Function>>> {
    Ok(Json(state.store.list_functions(None).await?))
}

/// List Functions in one namespace
pub async fn list_functions(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<Function>>> {
    Ok(Json(state.store.list_functions(Some(&namespace)).await?))
}

/// Get a specific Function
pub async fn get_function(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Function>> {
    let key = ResourceKey::new(namespace, name);
    Ok(Json(fetch(&state, &key).await?))
}

/// Create a Function
pub async fn create_function(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    ApiJson(request): ApiJson<CreateFunctionRequest>,
) -> ApiResult<(StatusCode, Json<Function>)> {
    validate_name("namespace", &namespace)?;
    validate_name("name", &request.name)?;
    validate_spec(&request.spec)?;

    let key = ResourceKey::new(&namespace, &request.name);
    let mut metadata = ObjectMeta::new(namespace, request.name);
    metadata.labels = request.labels;
    let created = state
        .store
        .create_function(Function::new(metadata, request.spec))
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists(_) => {
                ApiError::Conflict(format!("Function {} already exists", key))
            }
            e => e.into(),
        })?;

    tracing::info!(
        function = %key,
        replicas = created.spec.replicas,
        "Created function"
    );
    state.scheduler.trigger(key, TriggerReason::Change).await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a Function's spec
pub async fn update_function(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    ApiJson(request): ApiJson<UpdateFunctionRequest>,
) -> ApiResult<Json<Function>> {
    validate_spec(&request.spec)?;

    let key = ResourceKey::new(namespace, name);
    let mut function = fetch(&state, &key).await?;

    function.spec = request.spec;
    if let Some(labels) = request.labels {
        function.metadata.labels = labels;
    }
    function.metadata.resource_version = request.resource_version.unwrap_or(0);

    let updated = state.store.apply_function(function).await?;

    tracing::info!(
        function = %key,
        generation = updated.metadata.generation,
        replicas = updated.spec.replicas,
        "Updated function"
    );
    state.scheduler.trigger(key, TriggerReason::Change).await;

    Ok(Json(updated))
}

/// Delete a Function and its units
pub async fn delete_function(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<DeleteFunctionResponse>> {
    let key = ResourceKey::new(namespace, name);
    if !state.store.delete_function(&key).await? {
        return Err(ApiError::NotFound(format!("Function {} not found", key)));
    }

    tracing::info!(function = %key, "Deleted function");
    state.scheduler.trigger(key, TriggerReason::Change).await;

    Ok(Json(DeleteFunctionResponse { deleted: true }))
}

/// List the units a Function's selector matches
pub async fn list_function_units(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ExecutionUnit>>> {
    let key = ResourceKey::new(namespace, name);
    let function = fetch(&state, &key).await?;
    let units = state
        .store
        .list_units(&function.metadata.namespace, &function.selector())
        .await?;
    Ok(Json(units))
}

async fn fetch(state: &AppState, key: &ResourceKey) -> ApiResult<Function> {
    state
        .store
        .get_function(key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Function {} not found", key)))
}

/// Names are DNS-1123 labels: lowercase alphanumerics and '-', 1 to 63
/// characters, alphanumeric at both ends
fn validate_name(field: &str, value: &str) -> ApiResult<()> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !value.starts_with('-')
        && !value.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "{} '{}' must be a lowercase DNS label of at most 63 characters",
            field, value
        )))
    }
}

fn validate_spec(spec: &FunctionSpec) -> ApiResult<()> {
    if spec.runtime_image.trim().is_empty() {
        return Err(ApiError::Validation("runtimeImage must not be empty".to_string()));
    }
    if spec.code.trim().is_empty() {
        return Err(ApiError::Validation("code must not be empty".to_string()));
    }
    Ok(())
}
