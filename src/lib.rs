//! Core of the experiment definition console: form serialization, section
//! editors with allocation validation, background job monitoring and the
//! test matrix list.

pub mod client;
pub mod config;
pub mod editor;
pub mod forms;
pub mod jobs;
pub mod logging;
pub mod matrix;
pub mod model;
