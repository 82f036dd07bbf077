//! People registered in the community directory.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub nombre: String,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub biografia: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Persona {
    /// Display name, `nombre apellido` when both are present.
    #[must_use]
    pub fn nombre_completo(&self) -> String {
        match &self.apellido {
            Some(apellido) => format!("{} {}", self.nombre, apellido),
            None => self.nombre.clone(),
        }
    }
}

impl Entity for Persona {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreatePersona {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub apellido: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 30, message = "must be between 6 and 30 characters"))]
    pub telefono: Option<String>,
    pub biografia: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePersona {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub apellido: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 30, message = "must be between 6 and 30 characters"))]
    pub telefono: Option<String>,
    pub biografia: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Personas;

impl EntitySchema for Personas {
    const ENTITY_TYPE: EntityType = EntityType::Persona;
    const SEARCH_FIELD: &'static str = "nombre";
    const SOFT_DELETE: bool = true;

    type Record = Persona;
    type CreateInput = CreatePersona;
    type UpdateInput = UpdatePersona;
}

pub type PersonaService = BaseService<Personas>;
