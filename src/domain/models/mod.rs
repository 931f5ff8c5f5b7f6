pub mod badge;
pub mod repository;
pub mod run;
