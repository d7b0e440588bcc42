mod error_handler;
mod rate_limit;

pub use error_handler::{TRACE_ID_HEADER, log_errors};
pub use rate_limit::{UNKNOWN_CLIENT, client_id, rate_limit};
