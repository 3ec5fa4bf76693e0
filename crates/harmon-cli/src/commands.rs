//! Subcommand implementations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use harmon_ingest::{profile_columns, read_table};
use harmon_model::{Candidate, Table, reference_dictionary};
use harmon_task::{
    AppContext, SessionConfig, SharedSession, TaskHandle, TaskState,
};

use crate::cli::{
    ExportArgs, ExportFormatArg, MatchersArgs, ReviewArgs, ReviewOpArg, SessionArgs, SuggestArgs,
};
use crate::summary::{print_candidates, print_matchers};

/// An opened session with its owning context.
pub struct CliSession {
    context: AppContext,
    session: SharedSession,
    source_path: PathBuf,
}

/// Reads the input tables and opens the session named by the args.
pub fn open_session(args: &SessionArgs) -> Result<CliSession> {
    let source = read_table(&args.source)
        .with_context(|| format!("read source table {}", args.source.display()))?;
    for (column, profile) in profile_columns(&source) {
        debug!(
            %column,
            is_numeric = profile.is_numeric,
            unique_ratio = profile.unique_ratio,
            null_ratio = profile.null_ratio,
            "profiled source column"
        );
    }
    let target = match &args.target {
        Some(path) => Some(
            read_table(path).with_context(|| format!("read target table {}", path.display()))?,
        ),
        None => None,
    };
    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| source.name.clone());

    let context = AppContext::new(&args.cache_dir, reference_dictionary());
    let config = SessionConfig {
        top_k: args.top_k,
        ..SessionConfig::default()
    };
    let session = context.open_session(&session_id, source, target, args.nodes.clone(), config);
    Ok(CliSession {
        context,
        session,
        source_path: args.source.clone(),
    })
}

/// Runs a generation pass in the background, rendering step progress.
pub fn generate(cli: &CliSession) -> Result<Vec<Candidate>> {
    let handle = cli.context.spawn_generation(&cli.session);
    wait_with_progress(handle)
}

fn wait_with_progress(handle: TaskHandle<Vec<Candidate>>) -> Result<Vec<Candidate>> {
    let bar = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    loop {
        let status = handle.status();
        bar.set_position(u64::from(status.progress));
        bar.set_message(status.current_step.clone());
        if matches!(status.status, TaskState::Complete | TaskState::Failed) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    bar.finish_and_clear();
    handle.wait().map_err(|message| anyhow!(message))
}

pub fn run_suggest(args: &SuggestArgs) -> Result<()> {
    let cli = open_session(&args.session)?;
    let candidates = generate(&cli)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else {
        print_candidates(&candidates);
    }
    cli.context.shutdown();
    Ok(())
}

pub fn run_review(args: &ReviewArgs) -> Result<()> {
    let cli = open_session(&args.session)?;
    generate(&cli)?;

    let mut session = cli
        .session
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?;
    match args.op {
        ReviewOpArg::Accept | ReviewOpArg::Reject => {
            let source = required(&args.source_column, "--source-column")?;
            let target = required(&args.target_column, "--target-column")?;
            let candidate = session
                .candidates()
                .iter()
                .find(|c| c.is_pair(source, target))
                .cloned()
                .ok_or_else(|| anyhow!("no candidate maps '{source}' to '{target}'"))?;
            match args.op {
                ReviewOpArg::Accept => session.accept(&candidate)?,
                _ => session.reject(&candidate)?,
            }
            info!(%source, %target, "review decision applied");
        }
        ReviewOpArg::Discard => {
            let source = required(&args.source_column, "--source-column")?;
            session.discard(source)?;
            info!(%source, "column discarded");
        }
        ReviewOpArg::Undo => {
            if !session.undo()? {
                bail!("nothing to undo");
            }
        }
        ReviewOpArg::Redo => {
            if !session.redo()? {
                bail!("nothing to redo");
            }
        }
    }
    print_candidates(session.candidates());
    drop(session);
    cli.context.shutdown();
    Ok(())
}

pub fn run_matchers(args: &MatchersArgs) -> Result<()> {
    let cli = open_session(&args.session)?;
    generate(&cli)?;

    let mut session = cli
        .session
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?;
    if let Some(name) = &args.register {
        let definition = args
            .definition
            .as_deref()
            .ok_or_else(|| anyhow!("--definition is required with --register"))?;
        let params = parse_params(&args.params)?;
        let entries = session
            .register_matcher(name, definition, params)
            .map_err(|message| anyhow!(message))?;
        print_matchers(&entries);
    } else {
        print_matchers(session.matchers());
    }
    drop(session);
    cli.context.shutdown();
    Ok(())
}

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let cli = open_session(&args.session)?;
    generate(&cli)?;

    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        cli.source_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;

    let session = cli
        .session
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?;
    let stem = cli
        .source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "harmonized".to_string());

    if matches!(args.format, ExportFormatArg::Table | ExportFormatArg::Both) {
        let table = session.accepted_table(&stem);
        let path = output_dir.join(format!("{stem}_harmonized.csv"));
        write_csv(&table, &path)?;
        println!("Harmonized table: {}", path.display());
    }
    if matches!(args.format, ExportFormatArg::Mapping | ExportFormatArg::Both) {
        let mapping = session.accepted_mapping();
        let path = output_dir.join(format!("{stem}_mapping.json"));
        std::fs::write(&path, serde_json::to_string_pretty(&mapping)?)
            .with_context(|| format!("write mapping {}", path.display()))?;
        println!("Mapping document: {}", path.display());
    }
    drop(session);
    cli.context.shutdown();
    Ok(())
}

fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| anyhow!("{flag} is required for this operation"))
}

/// Parses repeated `key=value` flags into a parameter map.
fn parse_params(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --param '{pair}', expected key=value"))?;
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(params)
}

/// Writes a table as CSV, padding short columns with empty cells.
fn write_csv(table: &Table, path: &std::path::Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(table.column_names())?;
    for row in 0..table.row_count() {
        let record: Vec<&str> = table
            .columns
            .iter()
            .map(|c| {
                c.values
                    .get(row)
                    .and_then(|v| v.as_deref())
                    .unwrap_or("")
            })
            .collect();
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_key_value_pairs() {
        let params =
            parse_params(&["threshold=0.9".to_string(), "dimension=128".to_string()]).unwrap();
        assert_eq!(params["threshold"], "0.9");
        assert_eq!(params["dimension"], "128");
        assert!(parse_params(&["broken".to_string()]).is_err());
    }
}
