//! Meme images: captioned templates, personal uploads and image search.

pub mod images;
pub mod layout;
pub mod plugin;
pub mod request;
pub mod search;

pub use images::TemplateStore;
pub use layout::MemeImage;
pub use plugin::MemePlugin;
pub use search::{ImageFetcher, NaverImages};
