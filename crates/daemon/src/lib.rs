// annotator-daemon library entry point.

pub mod api;
pub mod config;
pub mod locator;
pub mod roots;
pub mod runtime;
pub mod search;
pub mod service;
pub mod store;
