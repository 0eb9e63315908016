pub mod cdn;
pub mod cli;
pub mod credentials;
pub mod load_app;
pub mod render;
pub mod sigv4;
pub mod store;

pub use cli::{run, Cli};
