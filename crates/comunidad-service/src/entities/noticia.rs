//! News items published on the community site.

use crate::base::{BaseService, EntitySchema};
use chrono::{DateTime, NaiveDate, Utc};
use comunidad_core::{rules, Entity, EntityType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Noticia {
    pub id: String,
    pub titulo: String,
    pub contenido: Option<String>,
    pub fecha_publicacion: Option<NaiveDate>,
    pub fuente: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Noticia {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateNoticia {
    #[validate(
        length(min = 3, max = 250, message = "must be between 3 and 250 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: String,
    pub contenido: Option<String>,
    pub fecha_publicacion: Option<NaiveDate>,
    #[validate(url(message = "must be a valid URL"))]
    pub fuente: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateNoticia {
    #[validate(
        length(min = 3, max = 250, message = "must be between 3 and 250 characters"),
        custom(function = "rules::not_blank")
    )]
    pub titulo: Option<String>,
    pub contenido: Option<String>,
    pub fecha_publicacion: Option<NaiveDate>,
    #[validate(url(message = "must be a valid URL"))]
    pub fuente: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Noticias;

impl EntitySchema for Noticias {
    const ENTITY_TYPE: EntityType = EntityType::Noticia;
    const SEARCH_FIELD: &'static str = "titulo";

    type Record = Noticia;
    type CreateInput = CreateNoticia;
    type UpdateInput = UpdateNoticia;
}

pub type NoticiaService = BaseService<Noticias>;
