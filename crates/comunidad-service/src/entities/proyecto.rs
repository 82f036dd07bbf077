//! Community projects with a lifecycle state and a date window.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, NaiveDate, Utc};
use comunidad_core::{rules, ComunidadError, ComunidadResult, Entity, EntityType, ValidateExt};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Accepted values of `estado`.
pub const ESTADOS: &[&str] = &["planificado", "en_curso", "finalizado", "suspendido"];

fn estado_valido(value: &str) -> Result<(), ValidationError> {
    rules::one_of(value, ESTADOS)
}

fn fechas_en_orden(inicio: Option<NaiveDate>, fin: Option<NaiveDate>) -> ComunidadResult<()> {
    match (inicio, fin) {
        (Some(inicio), Some(fin)) if fin < inicio => Err(ComunidadError::validation(
            "fecha_fin",
            fin.to_string(),
            format!("must not be before fecha_inicio ({})", inicio),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proyecto {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub estado: String,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Proyecto {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProyecto {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: String,
    pub descripcion: Option<String>,
    #[validate(custom(function = "estado_valido"))]
    pub estado: String,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
}

impl CreateProyecto {
    /// A planned project with no dates.
    #[must_use]
    pub fn new(nombre: impl Into<String>) -> Self {
        Self {
            nombre: nombre.into(),
            descripcion: None,
            estado: "planificado".to_string(),
            fecha_inicio: None,
            fecha_fin: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProyecto {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    #[validate(custom(function = "estado_valido"))]
    pub estado: Option<String>,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy)]
pub struct Proyectos;

impl EntitySchema for Proyectos {
    const ENTITY_TYPE: EntityType = EntityType::Proyecto;
    const SEARCH_FIELD: &'static str = "nombre";
    const SOFT_DELETE: bool = true;

    type Record = Proyecto;
    type CreateInput = CreateProyecto;
    type UpdateInput = UpdateProyecto;

    fn validate_create_input(input: &CreateProyecto) -> ComunidadResult<()> {
        input.validate_input()?;
        fechas_en_orden(input.fecha_inicio, input.fecha_fin)
    }

    // Only checks the window when both ends are part of the patch.
    fn validate_update_input(input: &UpdateProyecto) -> ComunidadResult<()> {
        input.validate_input()?;
        fechas_en_orden(input.fecha_inicio, input.fecha_fin)
    }
}

pub type ProyectoService = BaseService<Proyectos>;
