mod http;
mod transport;

pub use http::{HttpTransport, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
pub use transport::Transport;
