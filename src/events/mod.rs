//! Background systems running next to the http server
pub mod conductor;
