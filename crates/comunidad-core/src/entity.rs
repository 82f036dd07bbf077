//! Entity type tags.

use crate::ComunidadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag naming a kind of domain record.
///
/// The tag namespaces every cache key of the entity and selects the default
/// table and field projection used by the entity's service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Persona,
    Organizacion,
    Tema,
    Proyecto,
    Entrevista,
    Noticia,
    Curso,
    HistoriaOral,
    OfertaLaboral,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Persona,
        Self::Organizacion,
        Self::Tema,
        Self::Proyecto,
        Self::Entrevista,
        Self::Noticia,
        Self::Curso,
        Self::HistoriaOral,
        Self::OfertaLaboral,
    ];

    /// Returns the tag used in cache keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Organizacion => "organizacion",
            Self::Tema => "tema",
            Self::Proyecto => "proyecto",
            Self::Entrevista => "entrevista",
            Self::Noticia => "noticia",
            Self::Curso => "curso",
            Self::HistoriaOral => "historia_oral",
            Self::OfertaLaboral => "oferta_laboral",
        }
    }

    /// Returns the backing-store table conventionally holding this entity.
    #[must_use]
    pub const fn default_table(&self) -> &'static str {
        match self {
            Self::Persona => "personas",
            Self::Organizacion => "organizaciones",
            Self::Tema => "temas",
            Self::Proyecto => "proyectos",
            Self::Entrevista => "entrevistas",
            Self::Noticia => "noticias",
            Self::Curso => "cursos",
            Self::HistoriaOral => "historias_orales",
            Self::OfertaLaboral => "ofertas_laborales",
        }
    }

    /// Returns the columns selected by default for this entity.
    #[must_use]
    pub const fn default_projection(&self) -> &'static [&'static str] {
        match self {
            Self::Persona => &[
                "id", "nombre", "apellido", "email", "telefono", "biografia",
                "is_deleted", "deleted_by", "deleted_at", "created_at", "updated_at",
            ],
            Self::Organizacion => &[
                "id", "nombre", "descripcion", "sitio_web", "email",
                "is_deleted", "deleted_by", "deleted_at", "created_at", "updated_at",
            ],
            Self::Tema => &["id", "nombre", "descripcion", "created_at", "updated_at"],
            Self::Proyecto => &[
                "id", "nombre", "descripcion", "estado", "fecha_inicio", "fecha_fin",
                "is_deleted", "deleted_by", "deleted_at", "created_at", "updated_at",
            ],
            Self::Entrevista => &[
                "id", "titulo", "resumen", "fecha", "entrevistado_id",
                "created_at", "updated_at",
            ],
            Self::Noticia => &[
                "id", "titulo", "contenido", "fecha_publicacion", "fuente",
                "created_at", "updated_at",
            ],
            Self::Curso => &[
                "id", "titulo", "descripcion", "modalidad", "duracion_horas",
                "created_at", "updated_at",
            ],
            Self::HistoriaOral => &[
                "id", "titulo", "relato", "narrador", "lugar",
                "created_at", "updated_at",
            ],
            Self::OfertaLaboral => &[
                "id", "titulo", "descripcion", "organizacion_id", "fecha_cierre",
                "created_at", "updated_at",
            ],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ComunidadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ComunidadError::validation("entity_type", s, "unknown entity type"))
    }
}
