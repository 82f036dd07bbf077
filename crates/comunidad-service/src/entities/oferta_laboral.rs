//! Job offers posted by organizations.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, NaiveDate, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfertaLaboral {
    pub id: String,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub organizacion_id: Option<String>,
    pub fecha_cierre: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OfertaLaboral {
    /// True once `fecha_cierre` is in the past.
    #[must_use]
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        self.fecha_cierre.is_some_and(|cierre| cierre < today)
    }
}

impl Entity for OfertaLaboral {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateOfertaLaboral {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: String,
    pub descripcion: Option<String>,
    #[validate(custom(function = "rules::not_blank"))]
    pub organizacion_id: Option<String>,
    pub fecha_cierre: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOfertaLaboral {
    #[validate(
        length(min = 3, max = 200, message = "must be between 3 and 200 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: Option<String>,
    pub descripcion: Option<String>,
    #[validate(custom(function = "rules::not_blank"))]
    pub organizacion_id: Option<String>,
    pub fecha_cierre: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy)]
pub struct OfertasLaborales;

impl EntitySchema for OfertasLaborales {
    const ENTITY_TYPE: EntityType = EntityType::OfertaLaboral;
    const SEARCH_FIELD: &'static str = "titulo";

    type Record = OfertaLaboral;
    type CreateInput = CreateOfertaLaboral;
    type UpdateInput = UpdateOfertaLaboral;
}

pub type OfertaLaboralService = BaseService<OfertasLaborales>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_closed_after_deadline() {
        let oferta = OfertaLaboral {
            id: "O1".to_string(),
            titulo: "Técnico agrícola".to_string(),
            descripcion: None,
            organizacion_id: None,
            fecha_cierre: NaiveDate::from_ymd_opt(2024, 6, 30),
            created_at: None,
            updated_at: None,
        };
        let july = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let june = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        assert!(oferta.is_closed(july));
        assert!(!oferta.is_closed(june));
    }
}
