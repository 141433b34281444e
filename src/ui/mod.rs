pub mod app;
pub mod reader;
#[allow(clippy::module_inception)]
pub mod ui;
