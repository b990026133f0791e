//! Banter library exports for the server binary and tests

pub mod core;
pub mod inference;
pub mod server;

#[cfg(test)]
pub mod test_support;
