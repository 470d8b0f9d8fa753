//! Plain-text tables for terminal listings.

use std::fmt::Write as _;

use itertools::Itertools;

/// Renders a left-aligned table with a dashed rule under the header. Cells
/// beyond the header width are dropped; control whitespace becomes spaces.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| cell_text(header).chars().count().max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_text(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths
        .iter()
        .map(|width| "-".repeat((*width).max(3)))
        .collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|width| (*width).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", cell_text(value), width = *width))
        .join("  ")
        .trim_end()
        .to_string()
}

fn cell_text(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn columns_are_padded_to_the_widest_cell() {
        let rendered = render_table(
            &strings(&["name", "kind"]),
            &[strings(&["Location", "header"]), strings(&["Visit.Party", "fixed"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "name         kind");
        assert_eq!(lines[1], "-----------  ------");
        assert_eq!(lines[3], "Visit.Party  fixed");
    }

    #[test]
    fn embedded_newlines_do_not_break_rows() {
        let rendered = render_table(&strings(&["regex"]), &[strings(&["a\nb"])]);
        assert_eq!(rendered.lines().count(), 3);
    }
}
