//! Built-in globals available to every program.

mod console;

pub use console::create_console;
