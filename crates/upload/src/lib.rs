pub mod context;
pub mod error;
pub mod filename;
pub mod session;

pub use crate::context::{RemotePrefix, UploadContext};
pub use crate::filename::{ContentHashNamer, FileNamer, RandomTokenNamer};
pub use crate::session::{AssetResolver, Session};
