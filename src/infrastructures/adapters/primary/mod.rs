pub mod params;
pub mod web;
