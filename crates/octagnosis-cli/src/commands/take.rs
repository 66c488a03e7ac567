//! The `octagnosis take` command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use octagnosis_client::config::load_config_from;
use octagnosis_client::{create_service, BackendConfig};
use octagnosis_core::engine::QuizEngine;
use octagnosis_core::model::{AgeRange, Demographics, Gender, Question};
use octagnosis_core::parser::parse_question_bank;
use octagnosis_core::session::AttemptSession;

use super::print_result;

const BACK: &str = "<";

pub async fn execute(
    gender: Gender,
    age_range: AgeRange,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let service = create_service(&config)?;

    // An offline bank supplies type profiles and its own page size.
    let engine = match &config.backend {
        BackendConfig::Offline { bank } => {
            let bank = parse_question_bank(bank)?;
            QuizEngine::new(service, config.engine_config_with(bank.page_size))
                .with_profiles(bank.profiles())
        }
        BackendConfig::Http { .. } => QuizEngine::new(service, config.engine_config()),
    };

    let attempt_id = engine.start(&Demographics { gender, age_range }).await?;
    println!("Attempt {attempt_id} started.");

    let mut session = engine.new_session();
    engine.open(&mut session, &attempt_id.to_string()).await?;
    println!(
        "{} questions on {} pages. Answer 1-10, '{BACK}' goes back a page.",
        session.questions().len(),
        session.total_pages()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    answer_pages(&mut session, &mut lines).await?;

    let result = engine.submit(&mut session).await?;
    println!();
    print_result(&result, "text")?;

    if let Some(path) = output {
        result.save_json(&path)?;
        eprintln!("Result saved to: {}", path.display());
    }

    Ok(())
}

/// Walk the pages until the last one is complete.
async fn answer_pages<R>(session: &mut AttemptSession, lines: &mut Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        println!(
            "\nPage {}/{} ({:.0}% answered)",
            session.page_index() + 1,
            session.total_pages(),
            session.progress().percent()
        );

        let page: Vec<Question> = session.current_page_questions().to_vec();
        let mut went_back = false;
        for question in &page {
            if !answer_question(session, question, lines).await? {
                went_back = true;
                break;
            }
        }

        if went_back {
            session.retreat_page();
            continue;
        }
        if session.is_last_page() {
            return Ok(());
        }
        if let Err(e) = session.advance_page() {
            println!("{e}");
        }
    }
}

/// Prompt until `question` has a valid answer. Returns `false` when the user
/// asked to go back a page instead.
async fn answer_question<R>(
    session: &mut AttemptSession,
    question: &Question,
    lines: &mut Lines<R>,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let previous = session.answer(question.id);
        let shown = previous.map(|s| format!(" [{s}]")).unwrap_or_default();
        print!("{}. {}{shown}: ", question.id, question.text);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            anyhow::bail!("input ended before the attempt was complete");
        };
        let line = line.trim();

        if line == BACK {
            if session.is_first_page() {
                println!("  already on the first page");
                continue;
            }
            return Ok(false);
        }
        if line.is_empty() && previous.is_some() {
            return Ok(true);
        }

        match line.parse::<u8>() {
            Ok(score) => match session.set_answer(question.id, score) {
                Ok(()) => return Ok(true),
                Err(e) => println!("  {e}"),
            },
            Err(_) => println!("  enter a number from 1 to 10, or '{BACK}' to go back"),
        }
    }
}
