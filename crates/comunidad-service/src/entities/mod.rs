//! Concrete entity schemas and their services.

mod curso;
mod entrevista;
mod historia_oral;
mod noticia;
mod oferta_laboral;
mod organizacion;
mod persona;
mod proyecto;
mod tema;

pub use curso::*;
pub use entrevista::*;
pub use historia_oral::*;
pub use noticia::*;
pub use oferta_laboral::*;
pub use organizacion::*;
pub use persona::*;
pub use proyecto::*;
pub use tema::*;

/// Junction tables linking the entities.
pub mod junctions {
    use crate::relationship::Junction;

    #[must_use]
    pub fn persona_tema() -> Junction {
        Junction::new("persona_tema", "persona_id", "tema_id")
    }

    #[must_use]
    pub fn proyecto_persona() -> Junction {
        Junction::new("proyecto_persona", "proyecto_id", "persona_id")
    }

    #[must_use]
    pub fn proyecto_tema() -> Junction {
        Junction::new("proyecto_tema", "proyecto_id", "tema_id")
    }

    /// Carries a `rol` attribute.
    #[must_use]
    pub fn organizacion_persona() -> Junction {
        Junction::new("organizacion_persona", "organizacion_id", "persona_id")
    }

    #[must_use]
    pub fn all() -> Vec<Junction> {
        vec![
            persona_tema(),
            proyecto_persona(),
            proyecto_tema(),
            organizacion_persona(),
        ]
    }
}
