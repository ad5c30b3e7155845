//! Application services layer.

pub mod error;
pub mod refresh;
pub mod repos;
pub mod sitemap;
