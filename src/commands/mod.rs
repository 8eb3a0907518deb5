pub mod cache;
pub mod commits;
pub mod log;
pub mod settings;
pub mod sync;
