//! `volprobe list` command handler

use std::io::Write;

use serde::Serialize;

use volprobe_harness::catalog;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&build_catalog_report())
}

fn build_catalog_report() -> CatalogReport {
    CatalogReport {
        scenarios: catalog()
            .iter()
            .map(|t| CatalogEntry {
                name: t.name,
                description: t.description,
            })
            .collect(),
    }
}

/// Built-in scenario catalog.
#[derive(Serialize)]
pub struct CatalogReport {
    pub scenarios: Vec<CatalogEntry>,
}

#[derive(Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
}

impl Render for CatalogReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenarios ({}):", self.scenarios.len())?;
        let width = self
            .scenarios
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0);
        for entry in &self.scenarios {
            writeln!(
                w,
                "  {:<width$}  {}",
                entry.name.bold(),
                entry.description,
                width = width
            )?;
        }
        Ok(())
    }
}
