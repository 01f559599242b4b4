//! Risk register endpoints

pub mod types;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ApiState;
use crate::api::auth::{ProjectManage, ProjectRead, ProjectWrite};
use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::types::{NewActivity, NewRisk, RiskUpdate};
use crate::domain::activity::Action;
use crate::domain::risk::RiskSummary;

use types::{CreateRiskRequest, ListRisksQuery, RiskDto, UpdateRiskRequest};

#[derive(Deserialize)]
pub struct RiskPath {
    pub risk_id: String,
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_risks).post(create_risk))
        .route("/summary", get(risk_summary))
        .route(
            "/{risk_id}",
            get(get_risk).put(update_risk).delete(delete_risk),
        )
        .with_state(state)
}

fn risk_not_found(risk_id: &str) -> ApiError {
    ApiError::not_found("RISK_NOT_FOUND", format!("Risk not found: {}", risk_id))
}

/// A risk owner must belong to the project team
async fn check_owner(state: &ApiState, project_id: &str, owner_id: Option<&str>) -> Result<(), ApiError> {
    let Some(owner_id) = owner_id else {
        return Ok(());
    };
    let member = state
        .database
        .repository()
        .get_member(Some(&state.cache), project_id, owner_id)
        .await
        .map_err(ApiError::from_data)?;
    if member.is_none() {
        return Err(ApiError::field(
            "NOT_A_MEMBER",
            "owner_id",
            "Risk owner must be a member of the project team",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/risks",
    tag = "risks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "Filter by status")
    ),
    responses((status = 200, description = "Risks with score and rating"))
)]
pub async fn list_risks(
    State(state): State<ApiState>,
    access: ProjectRead,
    ValidatedQuery(query): ValidatedQuery<ListRisksQuery>,
) -> Result<Json<PaginatedResponse<RiskDto>>, ApiError> {
    let (rows, total) = state
        .database
        .repository()
        .list_risks(&access.project_id, query.status, query.page, query.limit)
        .await
        .map_err(ApiError::from_data)?;

    let data = rows.into_iter().map(RiskDto::from).collect();
    Ok(Json(PaginatedResponse::new(data, query.page, query.limit, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/risks",
    tag = "risks",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = CreateRiskRequest,
    responses(
        (status = 201, description = "Risk created", body = RiskDto),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_risk(
    State(state): State<ApiState>,
    access: ProjectWrite,
    ValidatedJson(body): ValidatedJson<CreateRiskRequest>,
) -> Result<(StatusCode, Json<RiskDto>), ApiError> {
    check_owner(&state, &access.project_id, body.owner_id.as_deref()).await?;

    let new = NewRisk {
        title: body.title.trim().to_string(),
        description: body.description,
        severity: body.severity,
        probability: body.probability,
        status: body.status,
        mitigation_plan: body.mitigation_plan,
        owner_id: body.owner_id,
    };
    let risk = state
        .database
        .repository()
        .create_risk(&access.project_id, &access.user_id, &new)
        .await
        .map_err(ApiError::from_data)?;

    let dto = RiskDto::from(risk);
    state
        .record(
            NewActivity::new(Action::RiskCreated, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "risk_id": dto.id, "rating": dto.rating })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// Rating counts over active risks plus the overall trend
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/risks/summary",
    tag = "risks",
    params(("project_id" = String, Path, description = "Project ID")),
    responses((status = 200, description = "Risk summary", body = RiskSummary))
)]
pub async fn risk_summary(
    State(state): State<ApiState>,
    access: ProjectRead,
) -> Result<Json<RiskSummary>, ApiError> {
    let risks = state
        .database
        .repository()
        .list_all_risks(&access.project_id)
        .await
        .map_err(ApiError::from_data)?;
    Ok(Json(RiskSummary::from_risks(&risks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/risks/{risk_id}",
    tag = "risks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("risk_id" = String, Path, description = "Risk ID")
    ),
    responses(
        (status = 200, description = "Risk details", body = RiskDto),
        (status = 404, description = "Risk not found")
    )
)]
pub async fn get_risk(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<RiskPath>,
) -> Result<Json<RiskDto>, ApiError> {
    let risk = state
        .database
        .repository()
        .get_risk(&access.project_id, &path.risk_id)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| risk_not_found(&path.risk_id))?;
    Ok(Json(RiskDto::from(risk)))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/risks/{risk_id}",
    tag = "risks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("risk_id" = String, Path, description = "Risk ID")
    ),
    request_body = UpdateRiskRequest,
    responses(
        (status = 200, description = "Risk updated", body = RiskDto),
        (status = 404, description = "Risk not found")
    )
)]
pub async fn update_risk(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<RiskPath>,
    ValidatedJson(body): ValidatedJson<UpdateRiskRequest>,
) -> Result<Json<RiskDto>, ApiError> {
    if let Some(owner_id) = &body.owner_id {
        check_owner(&state, &access.project_id, owner_id.as_deref()).await?;
    }

    let update = RiskUpdate {
        title: body.title.map(|t| t.trim().to_string()),
        description: body.description,
        severity: body.severity,
        probability: body.probability,
        status: body.status,
        mitigation_plan: body.mitigation_plan,
        owner_id: body.owner_id,
    };
    let risk = state
        .database
        .repository()
        .update_risk(&access.project_id, &path.risk_id, &update)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| risk_not_found(&path.risk_id))?;

    let dto = RiskDto::from(risk);
    state
        .record(
            NewActivity::new(Action::RiskUpdated, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "risk_id": dto.id, "status": dto.status, "rating": dto.rating })),
        )
        .await;

    Ok(Json(dto))
}

/// Delete a risk (manager+)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/risks/{risk_id}",
    tag = "risks",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("risk_id" = String, Path, description = "Risk ID")
    ),
    responses(
        (status = 204, description = "Risk deleted"),
        (status = 403, description = "Insufficient role"),
        (status = 404, description = "Risk not found")
    )
)]
pub async fn delete_risk(
    State(state): State<ApiState>,
    access: ProjectManage,
    Path(path): Path<RiskPath>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .database
        .repository()
        .delete_risk(&access.project_id, &path.risk_id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(risk_not_found(&path.risk_id));
    }

    state
        .record(
            NewActivity::new(Action::RiskDeleted, &access.user_id)
                .project(&access.project_id)
                .metadata(json!({ "risk_id": path.risk_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
