pub mod catalog;
pub mod world;
