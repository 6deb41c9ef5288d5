pub mod db;
pub mod error;
pub mod household;
pub mod models;
pub mod reaper;
pub mod resolver;
pub mod service;
pub mod store;
