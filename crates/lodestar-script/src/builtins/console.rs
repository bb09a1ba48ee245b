//! The `console` global.

use crate::runtime::value::{NativeFunction, Value};

/// Creates the `console` object with `log`, `warn` and `error`.
pub fn create_console() -> Value {
    Value::object_from([
        ("log".to_string(), print_fn("log", false)),
        ("warn".to_string(), print_fn("warn", true)),
        ("error".to_string(), print_fn("error", true)),
    ])
}

fn print_fn(name: &'static str, to_stderr: bool) -> Value {
    Value::Native(NativeFunction::new(name, move |args| {
        let line = args
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
        Ok(Value::Undefined)
    }))
}
