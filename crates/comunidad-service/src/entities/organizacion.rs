//! Organizations: cooperatives, associations, schools and companies.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizacion {
    pub id: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub sitio_web: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Organizacion {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateOrganizacion {
    #[validate(
        length(min = 2, max = 200, message = "must be between 2 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: String,
    pub descripcion: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub sitio_web: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOrganizacion {
    #[validate(
        length(min = 2, max = 200, message = "must be between 2 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub sitio_web: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Organizaciones;

impl EntitySchema for Organizaciones {
    const ENTITY_TYPE: EntityType = EntityType::Organizacion;
    const SEARCH_FIELD: &'static str = "nombre";
    const SOFT_DELETE: bool = true;

    type Record = Organizacion;
    type CreateInput = CreateOrganizacion;
    type UpdateInput = UpdateOrganizacion;
}

pub type OrganizacionService = BaseService<Organizaciones>;

#[cfg(test)]
mod tests {
    use super::*;
    use comunidad_core::ValidateExt;

    #[test]
    fn test_website_must_be_url() {
        let input = CreateOrganizacion {
            nombre: "Cooperativa El Ceibo".to_string(),
            sitio_web: Some("elceibo".to_string()),
            ..Default::default()
        };
        assert!(input.validate_input().is_err());

        let input = CreateOrganizacion {
            sitio_web: Some("https://elceibo.org".to_string()),
            ..input
        };
        assert!(input.validate_input().is_ok());
    }
}
