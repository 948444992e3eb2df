//! Remote id tag handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::dto::{AuthorizationDto, RemoteIdTagDto, SetRemoteIdTagRequest};
use crate::application::RemoteIdTagEntity;
use crate::domain::{DomainError, RemoteIdTag, TagOrigin};
use crate::interfaces::http::common::{ApiResponse, ValidatedJson};
use crate::interfaces::http::ApiState;

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn error_response(e: &DomainError) -> ApiError {
    let status = match e {
        DomainError::ChargePointNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ChargePointAlreadyExists(_) => StatusCode::CONFLICT,
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Propagation { .. } => StatusCode::BAD_GATEWAY,
        DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(e.to_string())))
}

/// Entity of a known charge point, attached on first use
async fn entity_for(
    state: &ApiState,
    charge_point_id: &str,
) -> Result<Arc<RemoteIdTagEntity>, ApiError> {
    if !state.central.contains(charge_point_id) {
        return Err(error_response(&DomainError::ChargePointNotFound(
            charge_point_id.to_string(),
        )));
    }
    if let Some(entity) = state.platform.remote_id_tag_entity(charge_point_id) {
        return Ok(entity);
    }

    state.platform.attach_charge_point(charge_point_id).await;
    state
        .platform
        .remote_id_tag_entity(charge_point_id)
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("text entity could not be attached")),
            )
        })
}

fn describe(state: &ApiState, entity: &RemoteIdTagEntity) -> RemoteIdTagDto {
    let charge_point_id = entity.charge_point_id();
    RemoteIdTagDto::from_entity(
        entity,
        state
            .central
            .get_remote_id_tag(charge_point_id)
            .map(RemoteIdTag::into_inner),
        state.central.lifecycle(charge_point_id),
    )
}

pub async fn get_remote_id_tag(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
) -> Result<Json<ApiResponse<RemoteIdTagDto>>, ApiError> {
    let entity = entity_for(&state, &charge_point_id).await?;
    Ok(Json(ApiResponse::success(describe(&state, &entity))))
}

/// User edit through the text entity.
///
/// Always 202 once validated: the response carries the optimistic record,
/// and `propagated == false` plus `last_error` when the central system did
/// not take the value.
pub async fn set_remote_id_tag(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SetRemoteIdTagRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RemoteIdTagDto>>), ApiError> {
    let entity = entity_for(&state, &charge_point_id).await?;
    let outcome = entity.set_value(&body.value).await;

    let dto = describe(&state, &entity).with_error(outcome.error.map(|e| e.to_string()));
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(dto))))
}

/// Replace the tag with a freshly generated one
pub async fn regenerate_remote_id_tag(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
) -> Result<Json<ApiResponse<RemoteIdTagDto>>, ApiError> {
    let entity = entity_for(&state, &charge_point_id).await?;
    state
        .central
        .set_remote_id_tag(&charge_point_id, None, TagOrigin::Api)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(ApiResponse::success(describe(&state, &entity))))
}

pub async fn get_authorization(
    State(state): State<ApiState>,
    Path((charge_point_id, id_tag)): Path<(String, String)>,
) -> Result<Json<ApiResponse<AuthorizationDto>>, ApiError> {
    if !state.central.contains(&charge_point_id) {
        return Err(error_response(&DomainError::ChargePointNotFound(
            charge_point_id,
        )));
    }

    let status = state
        .central
        .get_authorization_status(&charge_point_id, &id_tag);
    Ok(Json(ApiResponse::success(AuthorizationDto {
        charge_point_id,
        id_tag,
        status,
    })))
}
