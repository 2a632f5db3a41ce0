//! Core library: asset catalog, image encoding, style classification,
//! template recommendation and batch comment generation.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod recommend;
pub mod service;
pub mod uploads;

pub use error::{AppError, Result};
