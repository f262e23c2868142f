//! Plain-text grids for previews and mapping listings.

use std::fmt::Write as _;

use crate::mapping::MappingRules;

const UNASSIGNED: &str = "(unassigned)";
const GAP: &str = "  ";

/// Renders `headers` and `rows` as aligned columns. Rows shorter than the header are
/// padded with blanks; extra cells beyond the header are not shown.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| cell_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(headers.iter().map(String::as_str), &widths));
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(rule.iter().map(String::as_str), &rule_widths));
    for row in rows {
        let cells = (0..widths.len()).map(|idx| row.get(idx).map(String::as_str).unwrap_or(""));
        let _ = writeln!(output, "{}", format_line(cells, &widths));
    }
    output
}

/// Two-column listing of destination field against source column, in schema order.
pub fn render_rules(fields: &[String], rules: &MappingRules) -> String {
    let headers = vec!["field".to_string(), "source column".to_string()];
    let rows = fields
        .iter()
        .map(|field| {
            let source = rules
                .get(field)
                .and_then(|s| s.clone())
                .unwrap_or_else(|| UNASSIGNED.to_string());
            vec![field.clone(), source]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.zip(widths).enumerate() {
        if idx > 0 {
            line.push_str(GAP);
        }
        let flat = flatten(cell);
        let pad = width.saturating_sub(cell_width(&flat));
        line.push_str(&flat);
        line.push_str(&" ".repeat(pad));
    }
    line.trim_end().to_string()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

// Control characters would break the grid.
fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect()
}
