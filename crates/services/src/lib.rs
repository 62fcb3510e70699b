#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_loader;
pub mod error;
pub mod level_service;
pub mod progress_recorder;
pub mod task_service;
pub mod user_service;

pub use quest_core::Clock;

pub use app_services::AppServices;
pub use catalog_loader::load_catalog;
pub use error::{
    AppServicesError, CatalogLoadError, LevelServiceError, TaskServiceError, UserServiceError,
};
pub use level_service::LevelService;
pub use progress_recorder::ProgressRecorder;
pub use task_service::{Feedback, TaskAccess, TaskOutcome, TaskService, TaskView};
pub use user_service::UserService;
