//! Terminal output styling for the reconciliation and cleanup tools
//!
//! Pastel truecolor palette shared by every command.

use owo_colors::OwoColorize;

use crate::traits::Progress;

/// Print a success message with a green checkmark
pub fn success(message: &str) {
    // Pastel mint green: RGB(152, 225, 152)
    println!(
        "{} {}",
        "✓".truecolor(152, 225, 152).bold(),
        message.bright_white()
    );
}

/// Print an error message with a red X
pub fn error(message: &str) {
    // Pastel coral/salmon: RGB(255, 160, 160)
    eprintln!(
        "{} {}",
        "✗".truecolor(255, 160, 160).bold(),
        message.bright_white()
    );
}

/// Print a warning message with a yellow warning symbol
pub fn warning(message: &str) {
    // Pastel cream/yellow: RGB(255, 230, 160)
    println!(
        "{} {}",
        "⚠".truecolor(255, 230, 160).bold(),
        message.bright_white()
    );
}

/// Print an info message with a blue info symbol
pub fn info(message: &str) {
    // Pastel sky blue: RGB(160, 200, 255)
    println!(
        "{} {}",
        "ℹ".truecolor(160, 200, 255).bold(),
        message.bright_white()
    );
}

/// Print a section header with a separator line
pub fn section(title: &str) {
    // Pastel lavender: RGB(181, 174, 254)
    println!("\n{}", title.truecolor(181, 174, 254).bold());
    println!("{}", "─".repeat(50).truecolor(160, 160, 160));
}

/// Print a small section header without separator
pub fn subsection(title: &str) {
    // Softer pastel teal: RGB(120, 180, 195)
    println!("\n{}", title.truecolor(120, 180, 195));
    println!("{}", "·".repeat(30).truecolor(160, 160, 160));
}

/// Print a key-value pair with styled key and value
pub fn key_value(key: &str, value: &str) {
    println!(
        "  {} {}",
        format!("{}:", key).truecolor(160, 160, 160),
        value.bright_white()
    );
}

/// Print a dimmed/muted message
pub fn dimmed(message: &str) {
    // Brighter grey: RGB(160, 160, 160)
    println!("{}", message.truecolor(160, 160, 160));
}

/// One teardown result line, indented under the level header
pub fn progress(resource: &str, progress: &Progress) {
    match progress {
        Progress::Deleted => println!(
            "  {} {} {}",
            "✓".truecolor(152, 225, 152).bold(),
            resource.bright_white(),
            "deleted".truecolor(160, 160, 160)
        ),
        Progress::WouldDelete => println!(
            "  {} {}",
            "would delete".truecolor(160, 160, 160),
            resource.bright_white()
        ),
        Progress::Waiting => println!(
            "  {} {} {}",
            "…".truecolor(160, 200, 255).bold(),
            resource.bright_white(),
            "waiting for deletion".truecolor(160, 160, 160)
        ),
        Progress::Blocked(reason) | Progress::Failed(reason) => eprintln!(
            "  {} {} {}",
            "✗".truecolor(255, 160, 160).bold(),
            resource.bright_white(),
            reason.truecolor(255, 160, 160)
        ),
    }
}

/// Print a blank line for spacing
pub fn blank() {
    println!();
}

/// Print environment badge
pub fn environment_badge(env_name: &str, protected: bool) {
    if protected {
        // Pastel coral/salmon: RGB(255, 160, 160)
        println!(
            "  {} {} {}",
            "Environment:".dimmed(),
            env_name.truecolor(255, 160, 160).bold(),
            "(protected)".truecolor(255, 160, 160)
        );
    } else {
        // Pastel mint green: RGB(152, 225, 152)
        println!(
            "  {} {}",
            "Environment:".dimmed(),
            env_name.truecolor(152, 225, 152).bold()
        );
    }
}

/// Column widths wide enough for every header and cell
pub fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }
    widths
}

fn pad(text: &str, width: usize) -> String {
    format!("{:width$}", text, width = width)
}

/// Print a table with a header row and aligned columns
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = column_widths(headers, rows);

    // Softer pastel teal: RGB(120, 180, 195)
    let header = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(h, widths[i]).truecolor(120, 180, 195).bold().to_string())
        .collect::<Vec<_>>()
        .join(" │ ");
    println!("  {}", header);

    let total: usize = widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1);
    println!("  {}", "─".repeat(total).truecolor(160, 160, 160));

    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, v)| pad(v, widths[i]).bright_white().to_string())
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("  {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_widths_cover_headers_and_cells() {
        let rows = vec![
            vec!["S3 Bucket".to_string(), "proj-documents-dev".to_string()],
            vec!["VPC".to_string(), "vpc-1".to_string()],
        ];
        assert_eq!(column_widths(&["Type", "ID"], &rows), vec![9, 18]);
    }
}
