#![forbid(unsafe_code)]

pub mod backend;
pub mod cli;
pub mod console;
pub mod error;
pub mod formats;
pub mod interview;
pub mod logging;
pub mod screen;
pub mod session;
