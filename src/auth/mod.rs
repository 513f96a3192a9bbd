//! Authentication primitives: password hashing and JWT handling.

pub mod jwt;
pub mod password;
