//! Column listing from a schema file.
//!
//! Reads a schema document and renders its flattened, qualified column names,
//! source kinds, sources and aliases as an ASCII table.

use anyhow::{Context, Result};
use log::info;

use crate::{cli::ColumnsArgs, resolver::ResolvedColumn, schema::Schema, table};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {schema:?}", schema = args.schema))?;

    let columns = schema.columns();
    if columns.is_empty() {
        info!("Schema {:?} does not define any columns", args.schema);
        return Ok(());
    }

    let (headers, rows) = column_rows(columns);
    table::print_table(&headers, &rows);
    info!("Listed {} column(s) from {:?}", columns.len(), args.schema);
    Ok(())
}

pub fn column_rows(columns: &[ResolvedColumn]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = ["#", "name", "kind", "source", "alias"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let kind = column
                .source
                .kind()
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "invalid".to_string());
            let kind = match &column.timestamp {
                Some(timestamp) => format!("{kind} ({})", timestamp.kind),
                None => kind,
            };
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                kind,
                column.source.describe(),
                column.source.alias.clone().unwrap_or_default(),
            ]
        })
        .collect();
    (headers, rows)
}
