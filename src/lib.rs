pub mod artifact;
pub mod bake;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod error;
pub mod model;
pub mod schema;
pub mod scoring;
pub mod util;
