//! The `octagnosis score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use octagnosis_core::model::{AttemptId, QuestionBank};
use octagnosis_core::parser::{parse_answers, parse_question_bank};
use octagnosis_core::scoring;
use octagnosis_core::session::{AttemptSession, DEFAULT_PAGE_SIZE};

use super::print_result;

pub fn execute(bank_path: PathBuf, answers_path: PathBuf, format: String) -> Result<()> {
    let bank = parse_question_bank(&bank_path)?;
    let answers = parse_answers(&answers_path)?;

    // Run the sheet through a session so it gets the same checks as a live attempt.
    let mut session = AttemptSession::new(bank.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    let attempt_id = AttemptId::generate();
    session.initialize(&attempt_id.to_string())?;
    session
        .load_questions(bank.questions.clone())
        .with_context(|| format!("cannot use question bank {}", bank_path.display()))?;
    for (&question_id, &score) in &answers {
        session
            .set_answer(question_id, score)
            .with_context(|| format!("invalid answer sheet: {}", answers_path.display()))?;
    }

    let result_set = session.submit()?;
    let result = scoring::package_result(attempt_id, result_set, answers.len(), &bank.profiles());

    if format == "text" {
        print_totals(&bank, &session)?;
    }
    print_result(&result, &format)
}

fn print_totals(bank: &QuestionBank, session: &AttemptSession) -> Result<()> {
    let totals = scoring::type_totals(session.questions(), session.answers())?;
    let winners = session.result().map(|r| r.type_codes()).unwrap_or_default();
    let profiles = bank.profiles();

    let mut table = Table::new();
    table.set_header(vec!["Type", "Name", "Total", ""]);
    for (code, total) in &totals {
        let name = profiles
            .get(code)
            .map(|p| p.type_name.as_str())
            .unwrap_or_default();
        let marker = if winners.contains(&code) { "*" } else { "" };
        table.add_row(vec![
            Cell::new(code),
            Cell::new(name),
            Cell::new(total),
            Cell::new(marker),
        ]);
    }

    println!(
        "Scored {}/{} questions from {}",
        session.progress().answered,
        session.progress().total,
        bank.name
    );
    println!("{table}\n");
    Ok(())
}
