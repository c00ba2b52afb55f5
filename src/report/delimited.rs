//! Delimited-text and JSON export of record tables and yearly stats.

use crate::models::{Table, YearlyStat};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one row, quoting cells that contain the separator, quotes or newlines.
pub fn write_row<W: Write>(w: &mut W, row: &[String], sep: char) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", sep)?;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Text for one cell; null and missing render empty.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write a table with a header row of every column.
pub fn write_table<W: Write>(table: &Table, w: &mut W, sep: char) -> io::Result<()> {
    write_row(w, table.columns(), sep)?;
    for record in table {
        let row: Vec<String> = table
            .columns()
            .iter()
            .map(|column| cell_text(record.get(column)))
            .collect();
        write_row(w, &row, sep)?;
    }
    Ok(())
}

/// Write yearly stats with the conventional column headings.
pub fn write_stats<W: Write>(stats: &[YearlyStat], w: &mut W, sep: char) -> io::Result<()> {
    let header: Vec<String> = [
        "Received Year",
        "Applications",
        "Conditional Rate",
        "Refusal Rate",
        "Unconditional Rate",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    write_row(w, &header, sep)?;

    for stat in stats {
        let row = vec![
            stat.year.to_string(),
            stat.applications.to_string(),
            stat.conditional_rate.to_string(),
            stat.refusal_rate.to_string(),
            stat.unconditional_rate.to_string(),
        ];
        write_row(w, &row, sep)?;
    }
    Ok(())
}

/// Write a table as CSV to `path`.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_table(table, &mut w, ',')
        .and_then(|_| w.flush())
        .with_context(|| format!("Failed to write table to {}", path.display()))
}

/// Write a table as a JSON array of records to `path`.
pub fn write_table_json(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, table.records())
        .with_context(|| format!("Failed to write table to {}", path.display()))?;
    w.flush().context("Failed to flush table output")
}

/// Write yearly stats as CSV to `path`.
pub fn write_stats_csv(stats: &[YearlyStat], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_stats(stats, &mut w, ',')
        .and_then(|_| w.flush())
        .with_context(|| format!("Failed to write stats to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render_table(table: &Table) -> String {
        let mut out = Vec::new();
        write_table(table, &mut out, ',').unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_table_fills_missing_cells() {
        let table: Table = vec![
            json!({"Decision": "REFUSED", "Latitude": 53.2}),
            json!({"Decision": "CONDITIONAL"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        assert_eq!(
            render_table(&table),
            "Decision,Latitude\nREFUSED,53.2\nCONDITIONAL,\n"
        );
    }

    #[test]
    fn test_write_row_quotes() {
        let mut out = Vec::new();
        let row = vec![
            "Dublin, City".to_string(),
            "say \"hi\"".to_string(),
            "plain".to_string(),
        ];
        write_row(&mut out, &row, ',').unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"Dublin, City\",\"say \"\"hi\"\"\",plain\n"
        );
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&Value::Null)), "");
        assert_eq!(cell_text(Some(&json!("x"))), "x");
        assert_eq!(cell_text(Some(&json!(12))), "12");
        assert_eq!(cell_text(Some(&json!(true))), "true");
    }

    #[test]
    fn test_write_stats() {
        let stats = vec![YearlyStat {
            year: 2020,
            applications: 4,
            conditional_rate: 50.0,
            refusal_rate: 25.0,
            unconditional_rate: 12.5,
        }];
        let mut out = Vec::new();
        write_stats(&stats, &mut out, '\t').unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Received Year\tApplications\tConditional Rate\tRefusal Rate\tUnconditional Rate\n2020\t4\t50\t25\t12.5\n"
        );
    }

    #[test]
    fn test_write_table_files() {
        let dir = tempfile::tempdir().unwrap();
        let table: Table = vec![json!({"OBJECTID": 1}).as_object().cloned().unwrap()]
            .into_iter()
            .collect();

        let csv_path = dir.path().join("table.csv");
        write_table_csv(&table, &csv_path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&csv_path).unwrap(),
            "OBJECTID\n1\n"
        );

        let json_path = dir.path().join("table.json");
        write_table_json(&table, &json_path).unwrap();
        let parsed: Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed[0]["OBJECTID"], 1);
    }
}
