use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Print rows under left-aligned headers, columns separated by two spaces.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    for line in format_table(headers, &rows) {
        println!("{line}");
    }
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let pad = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:width$}", width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![pad(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(pad(row.iter().map(String::as_str).collect()));
    }
    lines
}

/// `-` for empty values in table cells.
pub fn or_dash(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let lines = format_table(
            &["NAME", "STATE"],
            &[
                vec!["demo".to_string(), "running".to_string()],
                vec!["abc-1-ws-1".to_string(), "created".to_string()],
            ],
        );
        assert_eq!(lines[0], "NAME        STATE");
        assert_eq!(lines[1], "----------  -------");
        assert_eq!(lines[2], "demo        running");
        assert_eq!(lines[3], "abc-1-ws-1  created");
    }
}
