//! Output formatting for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use filerelay::{RunSummary, TransferOutcome};

/// Print a table with a highlighted header row
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    println!("{}", build_table(headers, rows));
}

fn build_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }
    table
}

fn outcome_label(outcome: Option<TransferOutcome>) -> String {
    match outcome {
        Some(outcome) => outcome.to_string(),
        None => "(dry run)".to_string(),
    }
}

fn summary_rows(summary: &RunSummary) -> Vec<Vec<String>> {
    summary
        .files
        .iter()
        .map(|file| {
            vec![
                file.file_name.clone(),
                file.rule.clone(),
                file.predicate.clone(),
                file.record_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                outcome_label(file.outcome),
            ]
        })
        .collect()
}

/// Print a run summary as a table followed by totals
pub fn print_summary(summary: &RunSummary) {
    if summary.files.is_empty() {
        println!("No matching files.");
    } else {
        print_table(
            &["FILE", "RULE", "PREDICATE", "RECORDS", "OUTCOME"],
            summary_rows(summary),
        );
    }

    let purge_verb = if summary.dry_run { "to purge" } else { "purged" };
    println!(
        "{} file(s), {} archived, {} skipped, {} {}",
        summary.files.len(),
        summary.count(TransferOutcome::UploadedAndArchived),
        summary.count(TransferOutcome::SkippedNoMatch),
        summary.purged.len(),
        purge_verb
    );
    if summary.purge_failures > 0 {
        println!("{} archive entries could not be purged (see log)", summary.purge_failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filerelay::FileReport;

    #[test]
    fn test_summary_rows() {
        let summary = RunSummary {
            dry_run: true,
            files: vec![FileReport {
                file_name: "a_1.csv".to_string(),
                rule: "r".to_string(),
                predicate: "equal(ID,1)".to_string(),
                record_ids: vec![3, 4],
                outcome: None,
            }],
            ..RunSummary::default()
        };
        let rows = summary_rows(&summary);
        assert_eq!(rows[0][3], "3, 4");
        assert_eq!(rows[0][4], "(dry run)");

        let rendered = build_table(&["A", "B", "C", "D", "E"], rows).to_string();
        assert!(rendered.contains("a_1.csv"));
    }
}
