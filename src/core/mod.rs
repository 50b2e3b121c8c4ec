//! Core domain types

pub mod rules;
