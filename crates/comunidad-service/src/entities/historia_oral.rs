//! Oral histories told by community elders.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, Utc};
use comunidad_config::TtlPreset;
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoriaOral {
    pub id: String,
    pub titulo: String,
    pub relato: String,
    pub narrador: Option<String>,
    pub lugar: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for HistoriaOral {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateHistoriaOral {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: String,
    #[validate(custom(function = "rules::not_blank"))]
    pub relato: String,
    #[validate(length(max = 150, message = "must be at most 150 characters"))]
    pub narrador: Option<String>,
    #[validate(length(max = 150, message = "must be at most 150 characters"))]
    pub lugar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateHistoriaOral {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: Option<String>,
    #[validate(custom(function = "rules::not_blank"))]
    pub relato: Option<String>,
    #[validate(length(max = 150, message = "must be at most 150 characters"))]
    pub narrador: Option<String>,
    #[validate(length(max = 150, message = "must be at most 150 characters"))]
    pub lugar: Option<String>,
}

/// Searched by the story text rather than the title. Archived stories rarely
/// change, so they stay cached on the long preset.
#[derive(Debug, Clone, Copy)]
pub struct HistoriasOrales;

impl EntitySchema for HistoriasOrales {
    const ENTITY_TYPE: EntityType = EntityType::HistoriaOral;
    const SEARCH_FIELD: &'static str = "relato";
    const TTL_PRESET: TtlPreset = TtlPreset::Long;

    type Record = HistoriaOral;
    type CreateInput = CreateHistoriaOral;
    type UpdateInput = UpdateHistoriaOral;
}

pub type HistoriaOralService = BaseService<HistoriasOrales>;
