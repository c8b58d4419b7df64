use rollout::Feature;

const HEADERS: [&str; 3] = ["flag", "percentage", "active_teams"];
const COLUMN_GAP: &str = "  ";

/// Renders features as a left aligned table with a dashed rule under the header.
pub fn format_table(features: &[Feature]) -> String {
    let rows: Vec<[String; 3]> = features
        .iter()
        .map(|feature| {
            let teams = feature
                .sorted_team_ids()
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            [feature.name().to_string(), feature.percentage().to_string(), teams]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, HEADERS, widths);
    push_row(&mut out, widths.map(|w| "-".repeat(w)).each_ref().map(String::as_str), widths);
    for row in &rows {
        push_row(&mut out, row.each_ref().map(String::as_str), widths);
    }
    out
}

fn push_row(out: &mut String, cells: [&str; 3], widths: [usize; 3]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    out.push(' ');
    out.push_str(line.trim_end());
    out.push('\n');
}
