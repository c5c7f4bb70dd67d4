//! Domain operations. Handlers parse the request, call exactly one of these,
//! and shape the result; every access decision happens in here.

pub mod label;
pub mod note;
pub mod user;
