pub mod api;
pub mod codegen;
pub mod config;
pub mod dates;
pub mod debounce;
pub mod error;
pub mod form;
pub mod models;
pub mod normalize;
pub mod session;
