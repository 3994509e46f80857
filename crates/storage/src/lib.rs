pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::UploadBackend;
pub use crate::models::UploadInfo;
pub use crate::path::{join_remote, strip_url_suffix, validate as validate_key};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn UploadBackend + Send + Sync>;
