pub mod backend;
pub mod domain;
pub mod factory;
pub mod infrastructure;
#[allow(clippy::module_inception)]
pub mod video;
