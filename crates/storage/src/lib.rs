#![forbid(unsafe_code)]

pub mod auth;
pub mod password;
pub mod repository;
pub mod sqlite;
