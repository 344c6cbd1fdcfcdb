pub mod actions;
pub mod feeds;
pub mod index;
pub mod init;
pub mod media;

use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::output::{GlobalOptions, OutputManager, TableDisplay, themed_table};
use reelsync::{Applied, ToggleDirection};

/// Result of one mutating command.
#[derive(Debug, Serialize)]
pub struct MutationReport {
    pub action: &'static str,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
}

impl MutationReport {
    pub fn new(action: &'static str, target: &str, actor: Option<&str>, applied: Applied) -> Self {
        let outcome = match applied.toggled {
            Some(ToggleDirection::Added) => "added",
            Some(ToggleDirection::Removed) => "removed",
            None if applied.created_id.is_some() => "created",
            None => "done",
        };
        Self {
            action,
            target: target.to_string(),
            actor: actor.map(str::to_string),
            outcome,
            created_id: applied.created_id,
        }
    }

    /// Print as a one-line status in table mode, structured otherwise.
    pub fn emit(&self, output: &OutputManager, summary: &str) -> anyhow::Result<()> {
        if output.options.output_format != crate::output::OutputFormat::Table {
            return output.display(self);
        }
        match self.outcome {
            "added" => output.toggled(true, summary),
            "removed" => output.toggled(false, summary),
            _ => output.success(summary),
        }
        if let Some(id) = &self.created_id {
            output.key_value("id", id);
        }
        Ok(())
    }
}

impl TableDisplay for MutationReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Field", "Value"]);
        table.add_row(vec![Cell::new("action"), Cell::new(self.action)]);
        table.add_row(vec![Cell::new("target"), Cell::new(&self.target)]);
        if let Some(actor) = &self.actor {
            table.add_row(vec![Cell::new("actor"), Cell::new(actor)]);
        }
        table.add_row(vec![Cell::new("outcome"), Cell::new(self.outcome)]);
        if let Some(id) = &self.created_id {
            table.add_row(vec![Cell::new("id"), Cell::new(id)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        match &self.created_id {
            Some(id) => format!("{} {} {} {id}", self.action, self.target, self.outcome),
            None => format!("{} {} {}", self.action, self.target, self.outcome),
        }
    }
}
