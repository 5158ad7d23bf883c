use crate::sql::types::Row;

/// Renders a result set as a column-aligned text table with a header row,
/// a dash separator line and a row-count trailer:
///
/// ```text
/// make   | avg_price
/// -------+----------
/// BMW    | 30000
/// Toyota | 20000
/// (2 rows)
/// ```
///
/// Pure formatting: row truncation is the LIMIT executor's job.
pub fn render(columns: &[String], rows: &[Row]) -> String {
    let cells = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = columns.iter().map(|c| c.len()).collect::<Vec<_>>();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|c| c.as_str()), &widths);
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    out.push_str(&separator);
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row.iter().map(|c| c.as_str()), &widths);
    }
    match rows.len() {
        1 => out.push_str("(1 row)"),
        n => out.push_str(&format!("({} rows)", n)),
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .enumerate()
        .map(|(i, cell)| {
            let width = widths.get(i).copied().unwrap_or(0);
            format!("{:<width$}", cell)
        })
        .collect::<Vec<_>>()
        .join(" | ");
    // the last column stays ragged
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::Value;

    #[test]
    fn test_render_alignment() {
        let columns = vec!["make".to_string(), "avg_price".to_string()];
        let rows = vec![
            vec![Value::String("BMW".to_string()), Value::Float(30000.0)],
            vec![Value::String("Toyota".to_string()), Value::Null],
        ];
        assert_eq!(
            render(&columns, &rows),
            "make   | avg_price\n\
             -------+----------\n\
             BMW    | 30000\n\
             Toyota | NULL\n\
             (2 rows)"
        );
    }

    #[test]
    fn test_render_widens_to_longest_cell() {
        let columns = vec!["model".to_string()];
        let rows = vec![
            vec![Value::String("Grand Caravan".to_string())],
            vec![Value::String("Rio".to_string())],
        ];
        assert_eq!(
            render(&columns, &rows),
            "model\n\
             -------------\n\
             Grand Caravan\n\
             Rio\n\
             (2 rows)"
        );
    }

    #[test]
    fn test_render_empty_result() {
        let columns = vec!["make".to_string()];
        assert_eq!(render(&columns, &[]), "make\n----\n(0 rows)");
    }

    #[test]
    fn test_render_single_row() {
        let columns = vec!["cnt".to_string()];
        let rows = vec![vec![Value::Integer(42)]];
        assert_eq!(render(&columns, &rows), "cnt\n---\n42\n(1 row)");
    }
}
