//! weimark - Markdown to WeChat HTML converter

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use weimark::export::{ExportManager, ExportMetadata};
use weimark::{Pipeline, PipelineOptions, import_markdown};

#[derive(Parser)]
#[command(name = "weimark")]
#[command(version, about = "Markdown to WeChat HTML converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    weimark article.md article.html            Convert with the minimal template
    weimark -t tech article.md article.html    Convert with the tech template
    weimark -c article.md                      Check WeChat compatibility only")]
struct Cli {
    /// Input Markdown file (.md, .markdown, .txt)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output HTML file
    #[arg(value_name = "OUTPUT", required_unless_present = "check")]
    output: Option<PathBuf>,

    /// Style template (minimal, tech, academic)
    #[arg(short, long, default_value = "minimal")]
    template: String,

    /// Validate compatibility without writing output
    #[arg(short, long)]
    check: bool,

    /// Suppress validation warnings
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> weimark::Result<()> {
    let markdown = import_markdown(&cli.input)?;

    let mut pipeline = Pipeline::new(PipelineOptions {
        template: cli.template.clone(),
        ..PipelineOptions::default()
    });
    if !pipeline.set_template(&cli.template) {
        return Err(weimark::Error::UnknownTemplate(cli.template.clone()));
    }

    let output = pipeline.convert(&markdown);

    if !cli.quiet {
        for issue in &output.validation.issues {
            eprintln!("issue: {issue}");
        }
        for warning in &output.validation.warnings {
            eprintln!("warning: {warning}");
        }
        if output.unresolved > 0 {
            eprintln!("warning: {} unresolved placeholder(s)", output.unresolved);
        }
    }

    if cli.check {
        if output.validation.is_valid {
            println!("ok: output is WeChat-compatible");
            return Ok(());
        }
        return Err(weimark::Error::Export(format!(
            "{} compatibility issue(s)",
            output.validation.issues.len()
        )));
    }

    let out_path = cli.output.as_ref().expect("output required");
    let title = cli
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string();

    let mut exporter = ExportManager::new();
    exporter.export_to_file(
        out_path,
        &output.html,
        &ExportMetadata {
            title,
            template: cli.template.clone(),
        },
    )?;

    if !cli.quiet {
        println!("wrote {}", out_path.display());
    }
    Ok(())
}
