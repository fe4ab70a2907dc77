#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod filters;
pub mod formats;
pub mod interactive;
pub mod languages;
pub mod logging;
pub mod openlibrary;
pub mod render;
pub mod search;
pub mod snapshot;
pub mod store;
