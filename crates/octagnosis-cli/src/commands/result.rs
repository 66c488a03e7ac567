//! The `octagnosis result` command.

use std::path::PathBuf;

use anyhow::Result;

use octagnosis_client::config::load_config_from;
use octagnosis_client::create_service;
use octagnosis_core::engine::QuizEngine;
use octagnosis_core::model::AttemptId;

use super::print_result;

pub async fn execute(
    attempt_id: String,
    config_path: Option<PathBuf>,
    format: String,
) -> Result<()> {
    let attempt_id: AttemptId = attempt_id.trim().parse()?;

    let config = load_config_from(config_path.as_deref())?;
    let engine = QuizEngine::new(create_service(&config)?, config.engine_config());

    let result = engine.fetch_result(&attempt_id).await?;
    print_result(&result, &format)
}
