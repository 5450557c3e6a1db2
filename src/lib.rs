pub mod app;
pub mod audio;
pub mod command;
pub mod controller;
pub mod fx;
pub mod project;
pub mod sequencer;
