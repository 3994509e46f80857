pub mod error;
mod replace;
mod scan;
mod srcset;

pub use crate::replace::{UrlReplacer, rewrite_css_urls, rewrite_declaration, rewrite_image_set};
