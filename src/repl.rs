// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for the Lodestar runtime.

use lodestar_runtime::{Runtime, VERSION};
use lodestar_script::Engine;
use owo_colors::OwoColorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;

/// REPL configuration constants
const HISTORY_FILE: &str = ".lodestar_history";

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        if !input.starts_with('.') {
            return None;
        }

        let parts: Vec<&str> = input[1..].splitn(2, char::is_whitespace).collect();
        let cmd = parts.first()?.to_lowercase();
        let arg = parts.get(1).map(|a| a.trim()).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            _ => None,
        }
    }

    /// Get all available commands for the help message
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <identifier>", "Load a module and bind its exports"),
        ]
    }
}

/// The interactive session: script evaluation plus module loading through
/// the runtime.
pub struct Repl {
    editor: DefaultEditor,
    engine: Engine,
    runtime: Runtime,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Creates a REPL over an assembled runtime.
    pub fn new(runtime: Runtime) -> anyhow::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let history_path = dirs::home_dir().map(|home| home.join(HISTORY_FILE));
        if let Some(path) = &history_path {
            // A missing history file is fine on first launch
            let _ = editor.load_history(path);
        }

        Ok(Self {
            editor,
            engine: Engine::new(),
            runtime,
            history_path,
        })
    }

    /// Runs the session until `.exit` or EOF.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        print_banner();

        loop {
            match self.editor.readline("> ") {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(input);

                    if let Some((command, arg)) = ReplCommand::parse(input) {
                        if !self.handle_command(command, arg).await {
                            break;
                        }
                        continue;
                    }

                    self.eval_line(input);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("(to exit, press Ctrl+D or type .exit)");
                }
                Err(ReadlineError::Eof) => break,
                Err(error) => {
                    eprintln!("{}: {:?}", "REPL Error".red().bold(), error);
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    /// Handles a dot command; false means exit.
    async fn handle_command(&mut self, command: ReplCommand, arg: Option<&str>) -> bool {
        match command {
            ReplCommand::Help => {
                println!("{}", "Commands:".white().bold());
                for (name, description) in ReplCommand::all_commands() {
                    println!("    {:24} {}", name.cyan(), description);
                }
            }
            ReplCommand::Exit => return false,
            ReplCommand::Clear => {
                print!("\x1B[2J\x1B[1;1H");
            }
            ReplCommand::Version => {
                println!("{} {}", "lodestar".bright_cyan().bold(), VERSION.yellow());
            }
            ReplCommand::Load => {
                let Some(identifier) = arg else {
                    eprintln!("{}: .load requires a module identifier", "Error".red().bold());
                    return true;
                };
                match self.runtime.load_module(identifier).await {
                    Ok(bindings) => {
                        // Bind the exports under the identifier's last
                        // segment for follow-up expressions
                        let name = identifier.rsplit('/').next().unwrap_or(identifier);
                        self.engine.define_global(name, bindings.clone());
                        println!("{} = {}", name.green(), bindings);
                    }
                    Err(error) => {
                        eprintln!("{}: {}", "Error".red().bold(), error);
                    }
                }
            }
        }
        true
    }

    fn eval_line(&mut self, input: &str) {
        match self.engine.eval(input) {
            Ok(value) => {
                if !value.is_undefined() {
                    println!("{value}");
                }
            }
            Err(error) => {
                eprintln!("{}", error.to_string().red());
            }
        }
    }
}

fn print_banner() {
    println!(
        "{} v{} (type {} for commands)",
        "Lodestar".bright_cyan().bold(),
        VERSION.yellow(),
        ".help".cyan()
    );
}
