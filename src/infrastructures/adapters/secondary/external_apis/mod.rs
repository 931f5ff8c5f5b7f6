pub mod github;
pub mod secret_manager;
