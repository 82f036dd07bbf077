//! Recorded interviews with community members.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, NaiveDate, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrevista {
    pub id: String,
    pub titulo: String,
    pub resumen: Option<String>,
    pub fecha: Option<NaiveDate>,
    /// The interviewed `persona`.
    pub entrevistado_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Entrevista {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateEntrevista {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub resumen: Option<String>,
    pub fecha: Option<NaiveDate>,
    #[validate(custom(function = "rules::not_blank"))]
    pub entrevistado_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateEntrevista {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: Option<String>,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub resumen: Option<String>,
    pub fecha: Option<NaiveDate>,
    #[validate(custom(function = "rules::not_blank"))]
    pub entrevistado_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Entrevistas;

impl EntitySchema for Entrevistas {
    const ENTITY_TYPE: EntityType = EntityType::Entrevista;
    const SEARCH_FIELD: &'static str = "titulo";

    type Record = Entrevista;
    type CreateInput = CreateEntrevista;
    type UpdateInput = UpdateEntrevista;
}

pub type EntrevistaService = BaseService<Entrevistas>;
