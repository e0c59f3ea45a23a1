// src/models/mod.rs

pub mod author;
pub mod question;
pub mod quiz;
pub mod submission;
