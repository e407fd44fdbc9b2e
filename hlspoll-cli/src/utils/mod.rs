mod headers;

pub use headers::{merge_headers, parse_headers};
