mod config;

use std::path::{Path, PathBuf};

use clap::Parser;
use lang_check::Session;
use miette::{miette, IntoDiagnostic, NamedSource, Report, WrapErr};

use crate::config::{discover_files, find_config, load_config, ProjectConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Infer types of Closure-annotated JavaScript")]
struct Cli {
    /// Files to analyze, in order. Defaults to the `files` patterns of
    /// closure-infer.toml.
    files: Vec<PathBuf>,

    /// Path to closure-infer.toml. Searched for from the working directory
    /// when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Dotted global names to print. Every global is printed when omitted.
    #[arg(long = "query", value_name = "NAME")]
    queries: Vec<String>,

    /// Print documentation under each type
    #[arg(long)]
    docs: bool,
}

fn main() -> miette::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    let cwd = std::env::current_dir().into_diagnostic()?;
    let (project, config_dir) = project_config(args.config.as_deref(), &cwd)?;

    let files = if args.files.is_empty() {
        discover_files(&project, &config_dir)?
    } else {
        args.files.clone()
    };
    if files.is_empty() {
        eprintln!("No files to analyze");
        return Ok(());
    }

    let mut session = Session::new(project.analysis);
    let mut failed = 0usize;
    for path in &files {
        let source = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("could not read {}", path.display()))?;
        let name = path.strip_prefix(&config_dir).unwrap_or(path).display().to_string();

        if let Err(err) = session.analyze(name.as_str(), &source) {
            let report = Report::new(err).with_source_code(NamedSource::new(name, source));
            eprintln!("{report:?}");
            failed += 1;
        }
    }

    let names: Vec<String> = if args.queries.is_empty() {
        session
            .global_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    } else {
        args.queries.clone()
    };
    for name in &names {
        match session.type_of_name(name) {
            Some(ty) => println!("{name}: {ty}"),
            None => println!("{name}: <undefined>"),
        }
        if args.docs {
            if let Some(doc) = session.doc_of_name(name) {
                println!("    {doc}");
            }
        }
    }

    if failed > 0 {
        return Err(miette!("{failed} of {} files failed to parse", files.len()));
    }
    Ok(())
}

/// The project configuration and the directory its file patterns are
/// relative to.
fn project_config(explicit: Option<&Path>, cwd: &Path) -> miette::Result<(ProjectConfig, PathBuf)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(cwd),
    };
    let Some(path) = path else {
        log::debug!("no {} found, using defaults", config::CONFIG_FILE);
        return Ok((ProjectConfig::default(), cwd.to_path_buf()));
    };

    let project = load_config(&path)?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
    log::debug!("using {}", path.display());
    Ok((project, dir))
}
