#![forbid(unsafe_code)]

pub mod b64;
pub mod canonizer;
pub mod storeio;
pub mod writer;

pub use canonizer::Canonizer;
pub use writer::CanonicalWriter;
