pub mod config;
pub mod gpu;
pub mod pdf;
pub mod state;
pub mod ui;
pub mod viewer;
