//! Risk API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::{
    datetime, default_limit, default_page, double_option, validate_limit, validate_not_blank,
    validate_page,
};
use crate::core::constants::{DESCRIPTION_MAX_LEN, NAME_MAX_LEN};
use crate::data::types::{RiskLevel, RiskRow, RiskStatus};
use crate::domain::risk::{RiskRating, risk_score};

/// Risk with its computed impact score and rating
#[derive(Debug, Serialize, ToSchema)]
pub struct RiskDto {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: RiskLevel,
    pub probability: RiskLevel,
    /// severity × probability (1-9)
    pub score: u8,
    pub rating: RiskRating,
    pub status: RiskStatus,
    pub mitigation_plan: Option<String>,
    pub owner_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RiskRow> for RiskDto {
    fn from(row: RiskRow) -> Self {
        Self {
            score: risk_score(row.severity, row.probability),
            rating: RiskRating::of(row.severity, row.probability),
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            severity: row.severity,
            probability: row.probability,
            status: row.status,
            mitigation_plan: row.mitigation_plan,
            owner_id: row.owner_id,
            created_by: row.created_by,
            created_at: datetime(row.created_at),
            updated_at: datetime(row.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRiskRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Description is too long"))]
    pub description: Option<String>,

    pub severity: RiskLevel,

    pub probability: RiskLevel,

    #[serde(default)]
    pub status: RiskStatus,

    #[validate(length(max = DESCRIPTION_MAX_LEN, message = "Mitigation plan is too long"))]
    pub mitigation_plan: Option<String>,

    /// Team member responsible for the risk
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRiskRequest {
    #[validate(
        length(min = 1, max = NAME_MAX_LEN, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    pub severity: Option<RiskLevel>,
    pub probability: Option<RiskLevel>,
    pub status: Option<RiskStatus>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub mitigation_plan: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub owner_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListRisksQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub status: Option<RiskStatus>,
}
