//! Environment definitions and their content-derived identity.

pub mod identity;
pub mod templates;

pub use identity::{hash_bytes, hash_definition, load_definition, Definition, DefinitionFile};
pub use templates::{find_template, write_template, Template, TEMPLATES};
