use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Renders an elastic plain-text table. Columns without an entry in `aligns`
/// are left-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();

    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));

    let separator_cells = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &widths, &[]));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, aligns));
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) {
    print!("{}", render_table(headers, rows, aligns));
}

/// Headers from string literals.
pub fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate().take(widths.len()) {
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(sanitized.as_ref()));
        let cell = match aligns.get(idx).copied().unwrap_or_default() {
            Align::Left => format!("{sanitized}{}", " ".repeat(padding)),
            Align::Right => format!("{}{sanitized}", " ".repeat(padding)),
        };
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_aligned_columns_pad_on_the_left() {
        let rendered = render_table(
            &headers(&["column", "fill"]),
            &[
                vec!["NOME".to_string(), "100.0%".to_string()],
                vec!["UF".to_string(), "5.0%".to_string()],
            ],
            &[Align::Left, Align::Right],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "column  fill");
        assert_eq!(lines[1], "------  ------");
        assert_eq!(lines[2], "NOME    100.0%");
        assert_eq!(lines[3], "UF        5.0%");
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_table(&headers(&["a"]), &[vec!["x\ny".to_string()]], &[]);
        assert!(rendered.ends_with("x y\n"));
    }

    #[test]
    fn percent_uses_one_decimal() {
        assert_eq!(percent(0.5), "50.0%");
        assert_eq!(percent(2.0 / 3.0), "66.7%");
    }
}
