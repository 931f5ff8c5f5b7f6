pub mod generate_badge;
