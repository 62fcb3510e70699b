pub mod catalog;
mod ids;
mod progress;
mod user;

pub use catalog::{
    AnswerPattern, Catalog, CatalogError, LevelDefinition, TaskDefinition, TaskKind,
};
pub use ids::{LevelId, ParseIdError, UserId};

pub use progress::{TaskProgress, TaskState};
pub use user::{
    PASSWORD_MIN_CHARS, Registration, RegistrationDraft, RegistrationError, USERNAME_MAX_CHARS,
    USERNAME_MIN_CHARS,
};
