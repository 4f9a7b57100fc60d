pub mod commands;
pub mod footer;
pub mod header;
pub mod output_overlay;
pub mod render;
pub mod spinner;
pub mod startup;
pub mod summary;
