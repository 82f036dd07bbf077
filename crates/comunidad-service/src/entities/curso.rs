//! Training courses offered to the community.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Accepted values of `modalidad`.
pub const MODALIDADES: &[&str] = &["presencial", "virtual", "mixta"];

fn modalidad_valida(value: &str) -> Result<(), ValidationError> {
    rules::one_of(value, MODALIDADES)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curso {
    pub id: String,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub modalidad: String,
    pub duracion_horas: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Curso {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCurso {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: String,
    pub descripcion: Option<String>,
    #[validate(custom(function = "modalidad_valida"))]
    pub modalidad: String,
    #[validate(range(min = 1, max = 2000, message = "must be between 1 and 2000 hours"))]
    pub duracion_horas: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCurso {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: Option<String>,
    pub descripcion: Option<String>,
    #[validate(custom(function = "modalidad_valida"))]
    pub modalidad: Option<String>,
    #[validate(range(min = 1, max = 2000, message = "must be between 1 and 2000 hours"))]
    pub duracion_horas: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct Cursos;

impl EntitySchema for Cursos {
    const ENTITY_TYPE: EntityType = EntityType::Curso;
    const SEARCH_FIELD: &'static str = "titulo";

    type Record = Curso;
    type CreateInput = CreateCurso;
    type UpdateInput = UpdateCurso;
}

pub type CursoService = BaseService<Cursos>;
