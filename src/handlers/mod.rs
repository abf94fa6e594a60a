//! HTTP handlers

pub mod health;
pub mod pages;
pub mod predict;
pub mod predictions;
pub mod model;
pub mod users;
