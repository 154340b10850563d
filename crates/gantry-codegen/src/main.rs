use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;

use gantry_codegen::{config, emit};

#[derive(Parser)]
#[command(name = "gantry-gen")]
#[command(about = "Генерирует код регистрации типов gantry из YAML-документа")]
#[command(version = "0.1.0")]
struct Cli {
    /// Путь к YAML-документу с параметрами и типами
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Путь к генерируемому Rust-файлу
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// Обернуть сгенерированный код в `pub mod <имя>`
    #[arg(long)]
    package: Option<String>,

    /// Имя функции регистрации
    #[arg(long, default_value = "register_types")]
    function: String,

    /// Перезаписать выходной файл без вопроса
    #[arg(long)]
    overwrite: bool,

    /// Никогда не спрашивать: существующий файл без --overwrite это ошибка
    #[arg(long)]
    nointeraction: bool,

    /// Подробный лог генерации
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let doc = config::load(&cli.input)?;
    let source = emit::generate(&doc, cli.package.as_deref(), &cli.function)?;

    if !emit::write_generated(&cli.output, &source, cli.overwrite)? {
        if cli.nointeraction {
            bail!(
                "{} already exists, pass --overwrite to replace it",
                cli.output.display()
            );
        }
        if !confirm_overwrite(&cli.output)? {
            println!("Aborted, {} left untouched", cli.output.display());
            return Ok(());
        }
        emit::write_generated(&cli.output, &source, true)?;
    }

    println!(
        "Generated {} registration(s) into {}",
        doc.types.len(),
        cli.output.display()
    );
    Ok(())
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    print!("{} already exists, overwrite? [y/N] ", path.display());
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
