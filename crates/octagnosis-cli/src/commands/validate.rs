//! The `octagnosis validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let bank = octagnosis_core::parser::parse_question_bank(&bank_path)?;

    println!(
        "Question bank: {} ({} questions, {} types)",
        bank.name,
        bank.questions.len(),
        bank.types.len()
    );

    let warnings = octagnosis_core::parser::validate_question_bank(&bank);
    for w in &warnings {
        let prefix = w
            .question_id
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
