// src/models/mod.rs

pub mod attempt;
pub mod question;
pub mod subject;
pub mod user;
