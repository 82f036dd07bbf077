//! Topics used to classify people, projects and content.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tema {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Tema {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateTema {
    #[validate(
        length(min = 2, max = 120, message = "must be between 2 and 120 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub descripcion: Option<String>,
}

impl CreateTema {
    #[must_use]
    pub fn new(nombre: impl Into<String>) -> Self {
        Self {
            nombre: nombre.into(),
            descripcion: None,
        }
    }

    #[must_use]
    pub fn descripcion(mut self, descripcion: impl Into<String>) -> Self {
        self.descripcion = Some(descripcion.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTema {
    #[validate(
        length(min = 2, max = 120, message = "must be between 2 and 120 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub descripcion: Option<String>,
}

/// Schema of the `temas` table.
#[derive(Debug, Clone, Copy)]
pub struct Temas;

impl EntitySchema for Temas {
    const ENTITY_TYPE: EntityType = EntityType::Tema;
    const SEARCH_FIELD: &'static str = "nombre";

    type Record = Tema;
    type CreateInput = CreateTema;
    type UpdateInput = UpdateTema;
}

pub type TemaService = BaseService<Temas>;

#[cfg(test)]
mod tests {
    use super::*;
    use comunidad_core::{ComunidadError, ValidateExt};

    #[test]
    fn test_blank_name_is_rejected() {
        match CreateTema::new("   ").validate_input().unwrap_err() {
            ComunidadError::Validation { field, .. } => assert_eq!(field, "nombre"),
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_update_is_valid() {
        let update = UpdateTema {
            descripcion: Some("Producción agroecológica".to_string()),
            ..Default::default()
        };
        assert!(update.validate_input().is_ok());
    }
}
