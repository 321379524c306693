//! Tables command handler

use crate::commands::TablesArgs;
use crate::error::CliResult;
use nzverify::{Catalog, ColumnKind, ColumnSpec, Section};
use std::fmt::Write as _;

/// Execute the tables command
pub fn execute_tables(catalog: &Catalog, args: &TablesArgs) -> CliResult<()> {
    if args.yaml {
        print!("{}", catalog.to_yaml()?);
    } else {
        print!("{}", render_tables(catalog, args.section.map(Section::from)));
    }
    Ok(())
}

fn column_label(column: &ColumnSpec) -> String {
    let kind = match column.kind {
        ColumnKind::Entered => "entered",
        ColumnKind::Selected => "selected",
        ColumnKind::AutoPopulated => "auto",
        ColumnKind::Computed => "computed",
    };
    let trigger = if column.triggers_autofill { ", trigger" } else { "" };
    format!("{} ({kind}{trigger})", column.name)
}

/// Render tables, rollups and mirrors, optionally for one section
#[must_use]
pub fn render_tables(catalog: &Catalog, section: Option<Section>) -> String {
    let in_scope = |s: Section| section.map_or(true, |wanted| wanted == s);
    let mut out = String::new();

    for table in catalog.tables().iter().filter(|t| in_scope(t.section)) {
        let _ = writeln!(out, "{} [{}] {}", table.id, table.section, table.title);
        let columns: Vec<String> = table.columns.iter().map(column_label).collect();
        let _ = writeln!(out, "  columns: {}", columns.join(", "));
        let _ = writeln!(out, "  total = {}", table.total_rule.describe());
    }

    for rollup in catalog.section_totals().iter().filter(|r| in_scope(r.section)) {
        let tables: Vec<&str> = rollup.tables.iter().map(|t| t.as_str()).collect();
        let _ = writeln!(out, "{} [{}] = {}", rollup.label, rollup.section, tables.join(" + "));
    }

    for mirror in catalog
        .mirrors()
        .iter()
        .filter(|m| in_scope(m.from) || in_scope(m.to))
    {
        let _ = writeln!(
            out,
            "{}: {} → {} ({})",
            mirror.table,
            mirror.from,
            mirror.to,
            mirror.columns.join(", ")
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all() {
        let text = render_tables(&Catalog::builtin(), None);
        assert!(text.contains("scope1_fuels [Emissions]"));
        assert!(text.contains("fuel (selected, trigger)"));
        assert!(text.contains("total = factor × consumption"));
        assert!(text.contains("total = volume_litres × factor × 0.001"));
        assert!(text.contains("Scope 1 Total [Emissions] = scope1_fuels + scope1_refrigerants + scope1_process"));
        assert!(text.contains("scope1_fuels: Emissions → Energy (fuel, consumption, factor)"));
    }

    #[test]
    fn test_render_one_section() {
        let text = render_tables(&Catalog::builtin(), Some(Section::Water));
        assert!(text.contains("water_supply"));
        assert!(text.contains("Water Total"));
        assert!(!text.contains("scope1_fuels"));
    }
}
