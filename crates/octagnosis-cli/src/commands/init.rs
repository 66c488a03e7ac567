//! The `octagnosis init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("octagnosis.toml").exists() {
        println!("octagnosis.toml already exists, skipping.");
    } else {
        std::fs::write("octagnosis.toml", SAMPLE_CONFIG)?;
        println!("Created octagnosis.toml");
    }

    std::fs::create_dir_all("question-banks")?;
    let bank_path = std::path::Path::new("question-banks/sample.toml");
    if bank_path.exists() {
        println!("question-banks/sample.toml already exists, skipping.");
    } else {
        std::fs::write(bank_path, SAMPLE_BANK)?;
        println!("Created question-banks/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: octagnosis validate --bank question-banks/sample.toml");
    println!("  2. Run: octagnosis take --gender female --age-range 19-25");
    println!("  3. Point [backend] in octagnosis.toml at your server to use it instead");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# octagnosis configuration

page_size = 4
# "remote" lets the backend score; "local" scores on this machine.
scoring = "remote"
result_retries = 2
result_retry_delay_ms = 2000

[backend]
type = "offline"
bank = "question-banks/sample.toml"

# [backend]
# type = "http"
# base_url = "${OCTAGNOSIS_SERVER}"
# timeout_secs = 30
"#;

const SAMPLE_BANK: &str = include_str!("../../../../question-banks/sample.toml");
