pub mod command;
pub mod error;
pub mod hls;
pub mod pipeline;
pub mod probe;
pub mod runner;
#[cfg(test)]
pub mod testing;
pub mod thumbnails;

pub use error::MediaError;
pub use hls::Rendition;
pub use pipeline::TranscodePipeline;
pub use runner::MediaRunner;
