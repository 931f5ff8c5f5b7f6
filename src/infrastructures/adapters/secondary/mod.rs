pub mod external_apis;
pub mod file_secret_store;
