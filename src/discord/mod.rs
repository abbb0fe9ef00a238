pub mod bot;
pub mod commands;
pub mod render;
pub mod utils;
