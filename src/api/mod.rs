//! HTTP handlers

pub mod auth;
pub mod feed;
pub mod health;
pub mod pages;
pub mod upload;
