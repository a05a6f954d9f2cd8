//! Component C — artefact model, codec, and index-backed store.

pub mod index;
pub mod model;
pub mod store;

pub use index::{IndexEntry, KindIndex};
pub use model::{artefact_filename, kebab, ArtefactKind, EpicStatus, FrontMatter, IdResolver, ProductStatus, TaskStatus};
pub use store::{load, save, Artefact, ArtefactStore, CreateOptions, EditMode};
