//! HTTP protocol layer module
//!
//! Protocol helpers shared by the request handler, decoupled from file
//! serving itself: MIME detection, status builders, HTTP dates, and the
//! response layer that disables caching.

pub mod date;
pub mod mime;
pub mod no_cache;
pub mod response;

// Re-export commonly used types
pub use no_cache::{apply_no_cache_headers, NoCache};
pub use response::{
    apply_server_header, build_403_response, build_404_response, build_405_response,
    build_500_response, build_options_response, build_redirect_response,
    build_rejection_response, encode_response,
};
