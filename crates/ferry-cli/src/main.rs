#![deny(clippy::all, warnings)]

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use ferry_core::api::{self as api, CommandContext, CommandInfo, GlobalOptions};
use serde_json::Value;

mod cli;
mod dispatch;
mod style;

use cli::FerryCli;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = FerryCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };
    let ctx = CommandContext::new(&global);

    let (info, outcome) = dispatch::dispatch_command(&ctx, &cli.command)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 if quiet => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("ferry={level},ferry_core={level},ferry_domain={level},ferry_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &FerryCli, info: CommandInfo, outcome: &api::ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = api::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        let message = api::format_status_message(info, &outcome.message);
        println!("{}", style.status(&outcome.status, &message));
        if let Some(path) = outcome.details.get("config_path").and_then(Value::as_str) {
            println!("{}", style.info(&format!("Config written to {path}")));
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            let hint_line = format!("Hint: {hint}");
            println!("{}", style.info(&hint_line));
        }
        let rows = failed_steps(&outcome.details);
        if !rows.is_empty() {
            println!("{}", style.warning("Failed steps:"));
            println!("{}", format_failure_table(&style, &rows));
        }
    } else if code != 0 {
        eprintln!("{}", outcome.message);
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

struct FailureRow {
    phase: String,
    subject: String,
    action: String,
    error: String,
}

fn failed_steps(details: &Value) -> Vec<FailureRow> {
    let Some(steps) = details
        .get("report")
        .and_then(|report| report.get("steps"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    let text = |value: &Value, key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    steps
        .iter()
        .filter(|step| {
            step.get("outcome")
                .and_then(|outcome| outcome.get("status"))
                .and_then(Value::as_str)
                == Some("failed")
        })
        .map(|step| FailureRow {
            phase: text(step, "phase"),
            subject: text(step, "subject"),
            action: text(step, "action"),
            error: step
                .get("outcome")
                .map(|outcome| text(outcome, "error"))
                .unwrap_or_default(),
        })
        .collect()
}

fn format_failure_table(style: &Style, rows: &[FailureRow]) -> String {
    let headers = ["Phase", "Subject", "Action", "Error"];
    let mut widths = [
        headers[0].len(),
        headers[1].len(),
        headers[2].len(),
        headers[3].len(),
    ];

    for row in rows {
        widths[0] = widths[0].max(row.phase.len());
        widths[1] = widths[1].max(row.subject.len());
        widths[2] = widths[2].max(row.action.len());
        widths[3] = widths[3].max(row.error.len());
    }

    let header_line = format!(
        "{:<width0$}  {:<width1$}  {:<width2$}  {:<width3$}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        width0 = widths[0],
        width1 = widths[1],
        width2 = widths[2],
        width3 = widths[3],
    );

    let mut lines = Vec::new();
    lines.push(style.table_header(header_line.trim_end()));
    lines.push(format!(
        "{:-<width0$}  {:-<width1$}  {:-<width2$}  {:-<width3$}",
        "",
        "",
        "",
        "",
        width0 = widths[0],
        width1 = widths[1],
        width2 = widths[2],
        width3 = widths[3],
    ));

    for row in rows {
        let line = format!(
            "{:<width0$}  {:<width1$}  {:<width2$}  {:<width3$}",
            row.phase,
            row.subject,
            row.action,
            row.error,
            width0 = widths[0],
            width1 = widths[1],
            width2 = widths[2],
            width3 = widths[3],
        );
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collects_only_failed_steps() {
        let details = json!({
            "report": {
                "steps": [
                    {"phase": "repository-import", "subject": "alpha", "action": "register",
                     "outcome": {"status": "applied"}},
                    {"phase": "user-creation", "subject": "ghost", "action": "create-user",
                     "outcome": {"status": "failed", "error": "user already exists"}}
                ]
            }
        });
        let rows = failed_steps(&details);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject, "ghost");
        assert_eq!(rows[0].error, "user already exists");
    }

    #[test]
    fn failure_table_aligns_columns() {
        let style = Style::new(true, false);
        let rows = vec![FailureRow {
            phase: "repository-metadata".into(),
            subject: "dotfiles".into(),
            action: "add-collaborator".into(),
            error: "repository not found".into(),
        }];
        let table = format_failure_table(&style, &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(&format!("{:<19}  Subject", "Phase")));
        assert!(lines[1].starts_with(&format!("{}  --------", "-".repeat(19))));
        assert!(lines[2].ends_with("repository not found"));
    }
}
