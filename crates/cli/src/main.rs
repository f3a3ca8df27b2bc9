use anyhow::Result;
use clap::{Parser, ValueEnum};
use smart_image_renamer_core::{
    app_paths, apply_plan, generate_plan, load_config, load_config_from, parse_template,
    uses_token, AppConfig, ApplyResult, PlanOptions, RenamePlan, SkippedFile, Token,
};
use std::path::{Path, PathBuf};
use tracing::{warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "smart-image-renamer", version)]
#[command(about = "Smart Image Renamer\n\nRename your photos in bulk using information stored in EXIF.")]
#[command(after_help = token_help())]
struct Cli {
    /// Format of the new file name (defaults to the configured template)
    #[arg(short = 'f', long = "format")]
    format: Option<String>,
    /// Starting sequence number
    #[arg(short = 's', long = "sequence")]
    sequence: Option<u64>,
    /// Minimum number of digits for {Seq}
    #[arg(short = 'w', long = "seq-width")]
    seq_width: Option<usize>,
    /// Recursive mode
    #[arg(short = 'r', long, overrides_with = "no_recursive")]
    recursive: bool,
    /// Stay in the given folders even if the config enables recursion
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,
    /// Include hidden files
    #[arg(short = 'i', long, overrides_with = "no_include_hidden")]
    include_hidden: bool,
    /// Skip hidden files even if the config includes them
    #[arg(long, overrides_with = "include_hidden")]
    no_include_hidden: bool,
    /// Test mode. Don't apply changes.
    #[arg(short = 't', long = "test", visible_alias = "dry-run")]
    test: bool,
    /// Use the detected image format (JPEG, PNG, ...) as the extension
    #[arg(long, overrides_with = "no_ext_from_format")]
    ext_from_format: bool,
    /// Keep the original extension even if the config says otherwise
    #[arg(long, overrides_with = "ext_from_format")]
    no_ext_from_format: bool,
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,
    #[arg(short = 'q', long)]
    quiet: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Read settings from this TOML file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
    /// Path to file or directory
    #[arg(required_unless_present = "print_config")]
    input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    setup_logging(verbosity);

    let config = match cli.config.as_deref() {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if cli.print_config {
        return cmd_print_config(cli.config.as_deref(), &config);
    }

    cmd_rename(cli, &config, verbosity)
}

fn setup_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Quiet => Level::ERROR,
        Verbosity::Normal => Level::WARN,
        Verbosity::Verbose => Level::DEBUG,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn cmd_rename(cli: Cli, config: &AppConfig, verbosity: Verbosity) -> Result<()> {
    let template = cli.format.unwrap_or_else(|| config.template.clone());
    let parts = parse_template(&template)?;
    if !uses_token(&parts, Token::Sequence) {
        warn!("format string has no {{Seq}} token; files that resolve to the same name will be skipped");
    }

    let options = PlanOptions {
        inputs: cli.input.iter().map(|p| absolute(p)).collect(),
        recursive: switch(cli.recursive, cli.no_recursive, config.recursive_default),
        include_hidden: switch(
            cli.include_hidden,
            cli.no_include_hidden,
            config.include_hidden_default,
        ),
        template,
        sequence_start: cli.sequence.unwrap_or(config.sequence_start),
        sequence_width: cli.seq_width.unwrap_or(config.sequence_width),
        ext_from_format: switch(
            cli.ext_from_format,
            cli.no_ext_from_format,
            config.ext_from_format,
        ),
    };

    let plan = generate_plan(&options)?;
    let result = (!cli.test).then(|| apply_plan(&plan));

    match cli.output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "test_mode": cli.test,
                "plan": &plan,
                "result": &result,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(&plan, result.as_ref(), verbosity),
    }

    match result {
        Some(result) => {
            if verbosity != Verbosity::Quiet {
                eprintln!(
                    "Renamed {} file(s), {} already named, {} skipped.",
                    result.applied,
                    result.unchanged,
                    plan.skipped.len() + result.skipped.len()
                );
            }
        }
        None => {
            if verbosity != Verbosity::Quiet {
                eprintln!("Test mode: no files were changed.");
            }
        }
    }

    Ok(())
}

/// A `--flag`/`--no-flag` pair on top of a config default; the last one given wins.
fn switch(on: bool, off: bool, default: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        default
    }
}

fn cmd_print_config(explicit: Option<&Path>, config: &AppConfig) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => app_paths()?.config_path,
    };
    println!("Config file: {}", path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn print_table(plan: &RenamePlan, result: Option<&ApplyResult>, verbosity: Verbosity) {
    if verbosity == Verbosity::Quiet {
        return;
    }

    let failed: Vec<&Path> = result
        .map(|r| r.skipped.iter().map(|s| s.path.as_path()).collect())
        .unwrap_or_default();

    let mut current_folder: Option<&Path> = None;
    for candidate in &plan.candidates {
        if failed.contains(&candidate.original_path.as_path()) {
            continue;
        }
        let folder = candidate.original_path.parent();
        if folder != current_folder {
            if current_folder.is_some() {
                println!();
            }
            if let Some(folder) = folder {
                println!("Processing folder: {}", folder.display());
            }
            current_folder = folder;
        }

        if verbosity == Verbosity::Verbose {
            println!(
                "{} --> {}",
                candidate.original_path.display(),
                candidate.target_path.display()
            );
        } else {
            println!(
                "{} --> {}",
                file_name(&candidate.original_path),
                file_name(&candidate.target_path)
            );
        }
    }

    let skipped: Vec<&SkippedFile> = plan
        .skipped
        .iter()
        .chain(result.into_iter().flat_map(|r| r.skipped.iter()))
        .collect();
    if !skipped.is_empty() {
        println!("\nSkipped Files:");
        for file in skipped {
            println!("\t{} ({})", file.path.display(), file.reason);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn token_help() -> String {
    let mut help = String::from(
        "Format string for the file name is defined by a mix of custom text and following tags enclosed in {}:\n",
    );
    for token in Token::ALL {
        help.push_str(&format!("  {:<12}{}\n", token.name(), token.description()));
    }
    help.push_str(
        "\nExamples:\n  Format String:          {YYYY}-{MM}-{DD}-{Folder}-{Seq}\n  File Name:              2014-05-09-Wedding_Shoot-001.JPEG\n                          2014-05-09-Wedding_Shoot-002.JPEG\n",
    );
    help
}
