//! HTTP handlers, one module per route group.

pub mod auth;
pub mod chat;
pub mod diary;
pub mod emotion;
pub mod health;
