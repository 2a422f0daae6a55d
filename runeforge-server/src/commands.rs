//! Console command adapter.
//!
//! Maps operator command lines onto lifecycle controller calls and renders
//! success or failure as a human-readable reason. Authorization happens
//! before a command reaches this adapter.

use crate::error::LifecycleError;
use crate::lifecycle::LifecycleController;
use runeforge_runtime::ScriptIdentity;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(ScriptIdentity),
    Reload(ScriptIdentity),
    Unload(ScriptIdentity),
    List,
}

impl Command {
    /// Parse a command line. The script argument may omit the `.rhai`
    /// extension.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");
        let argument = words.next();

        match (command, argument) {
            ("list", None) => Ok(Command::List),
            ("load", Some(name)) => Ok(Command::Load(identity_from(name))),
            ("reload", Some(name)) => Ok(Command::Reload(identity_from(name))),
            ("unload", Some(name)) => Ok(Command::Unload(identity_from(name))),
            ("load" | "reload" | "unload", None) => {
                Err(format!("Usage: {command} <script>"))
            }
            _ => Err("Usage: load <script> | reload <script> | unload <script> | list".to_string()),
        }
    }
}

fn identity_from(name: &str) -> ScriptIdentity {
    if name.ends_with(".rhai") {
        ScriptIdentity::new(name)
    } else {
        ScriptIdentity::new(format!("{name}.rhai"))
    }
}

/// Execute a command line against the controller and render the outcome.
pub async fn execute(controller: &LifecycleController, line: &str) -> String {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(usage) => return usage,
    };

    match command {
        Command::Load(identity) => match controller.load(&identity).await {
            Ok(()) => format!("Loaded '{identity}'"),
            Err(e) => render_error(e),
        },
        Command::Reload(identity) => match controller.reload(&identity).await {
            Ok(()) => format!("Reloaded '{identity}'"),
            Err(e) => render_error(e),
        },
        Command::Unload(identity) => match controller.unload(&identity).await {
            Ok(()) => format!("Unloaded '{identity}'"),
            Err(e) => render_error(e),
        },
        Command::List => {
            let statuses = controller.list().await;
            if statuses.is_empty() {
                return "No scripts known".to_string();
            }

            statuses
                .iter()
                .map(|s| {
                    format!(
                        "{} - {} ({} dependency(ies), {} handler(s))",
                        s.identity, s.state, s.dependencies, s.handlers
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

fn render_error(error: LifecycleError) -> String {
    if error.is_retryable() {
        format!("{error} - temporary failure, retry the command")
    } else {
        match &error {
            LifecycleError::Resolution(_) | LifecycleError::Context(_) => {
                format!("{error} - inspect the artifact or script before retrying")
            }
            _ => error.to_string(),
        }
    }
}
