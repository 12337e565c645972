mod http;
mod keys;
mod progress_stream;

pub use http::HttpObjectStore;
pub use keys::{canonical_public_url, destination_key, raw_object_url};
pub use progress_stream::ProgressStream;
