pub mod command;
pub mod controller;
pub mod error;
pub mod event;
pub mod options;
pub mod runner;
pub mod state;

pub(crate) mod process;
