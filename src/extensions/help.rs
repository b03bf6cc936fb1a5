//! Command catalog browsing.

use crate::error::ReplyResult;
use crate::extension::{CommandSpec, CoreHandle, Extension, Invocation};
use crate::rank::Rank;

#[derive(Default)]
pub struct Help {
    core: Option<CoreHandle>,
}

fn describe(extension: &str, spec: &CommandSpec) -> String {
    let usage = if spec.help.is_empty() { spec.name } else { spec.help };
    if spec.rank == Rank::None {
        format!("{usage} [{extension}]")
    } else {
        format!("{usage} [{extension}, requires {}]", spec.rank)
    }
}

impl Help {
    fn help(&self, core: &CoreHandle, args: &[String]) -> String {
        let catalog = core.catalog();
        match args {
            [] => {
                let ids: Vec<&str> = catalog.entries().iter().map(|e| e.extension.as_str()).collect();
                format!(
                    "Extensions: {}. Use help EXTENSION or help COMMAND for details.",
                    ids.join(", ")
                )
            }
            [name] => {
                if let Some(entry) = catalog.extension(name) {
                    let names: Vec<&str> = entry.commands.iter().map(|c| c.name).collect();
                    if names.is_empty() {
                        format!("{} has no commands.", entry.extension)
                    } else {
                        format!("{}: {}", entry.extension, names.join(", "))
                    }
                } else if let Some((extension, spec)) = catalog.command(name) {
                    describe(extension, spec)
                } else {
                    format!("No such extension or command: {name}")
                }
            }
            [extension, command, ..] => match catalog.extension(extension) {
                Some(entry) => match entry.commands.iter().find(|c| c.name.eq_ignore_ascii_case(command)) {
                    Some(spec) => describe(&entry.extension, spec),
                    None => format!("{} has no command {command}", entry.extension),
                },
                None => format!("No such extension: {extension}"),
            },
        }
    }
}

impl Extension for Help {
    fn id(&self) -> &str {
        "help"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("help", Rank::None, "help [EXTENSION|COMMAND] [COMMAND]"),
            CommandSpec::new("list_commands", Rank::None, "list_commands"),
            CommandSpec::new("list_plugins", Rank::None, "list_plugins"),
        ]
    }

    fn privileged(&self) -> bool {
        true
    }

    fn attach_core(&mut self, core: CoreHandle) {
        self.core = Some(core);
    }

    fn call(&mut self, command: &str, invocation: &Invocation) -> ReplyResult {
        let Some(core) = &self.core else {
            return Ok(None);
        };
        let reply = match command {
            "help" => self.help(core, &invocation.args),
            "list_commands" => {
                let catalog = core.catalog();
                let names: Vec<&str> = catalog
                    .entries()
                    .iter()
                    .flat_map(|e| e.commands.iter().map(|c| c.name))
                    .collect();
                format!("Commands: {}", names.join(", "))
            }
            "list_plugins" => {
                let catalog = core.catalog();
                let ids: Vec<&str> = catalog.entries().iter().map(|e| e.extension.as_str()).collect();
                format!("Loaded extensions: {}", ids.join(", "))
            }
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }
}
