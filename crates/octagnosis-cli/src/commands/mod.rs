pub mod init;
pub mod result;
pub mod score;
pub mod take;
pub mod validate;

use anyhow::Result;
use comfy_table::{Cell, Table};

use octagnosis_core::results::AttemptResult;

/// Print a result in the requested format: text, json, or markdown.
pub fn print_result(result: &AttemptResult, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(result)?),
        "markdown" | "md" => print!("{}", result.to_markdown()),
        _ => {
            let codes: Vec<&str> = result
                .result_set
                .type_codes()
                .into_iter()
                .map(|c| c.as_str())
                .collect();
            if result.is_tie() {
                println!(
                    "Result: tie between {} (score {})",
                    codes.join(", "),
                    result.max_score
                );
            } else {
                println!("Result: {} (score {})", codes.join(", "), result.max_score);
            }
            println!("Attempt: {}", result.attempt_id);
            println!(
                "Completed: {} ({} questions answered)",
                result.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                result.total_questions_answered
            );

            let mut table = Table::new();
            table.set_header(vec!["Type", "Name", "Title", "Score", "Strengths"]);
            for r in &result.result_set {
                let profile = result.profile(&r.type_code).cloned().unwrap_or_default();
                table.add_row(vec![
                    Cell::new(&r.type_code),
                    Cell::new(profile.type_name),
                    Cell::new(profile.title),
                    Cell::new(r.aggregate_score),
                    Cell::new(profile.strength_keywords.join(", ")),
                ]);
            }
            println!("\n{table}");
        }
    }
    Ok(())
}
