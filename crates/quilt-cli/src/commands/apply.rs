//! Implementation of the `quilt apply` command.
//!
//! Translates CLI arguments into a template reference and a run
//! configuration, wires the adapters, runs the core service and displays
//! the report. No business logic lives here.

use std::io::{self, IsTerminal as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use quilt_adapters::{
    ChangeKind, DryRunCommandRunner, GitSourceResolver, Interrupt, LocalFilesystem,
    OverlayFilesystem, ProcessCommandRunner, TomlFragmentLoader,
};
use quilt_core::{
    application::{ApplyService, RunReport, ports::Filesystem},
    domain::{RunConfig, TemplateReference},
};

use crate::{
    cli::{ApplyArgs, GlobalArgs, OutputFormat},
    config::AppConfig,
    error::{CliError, CliResult},
    lock::TargetLock,
    output::OutputManager,
};

/// Machine-readable result of `quilt apply --output-format json`.
#[derive(Debug, Serialize)]
struct ApplySummary<'a> {
    target: &'a Path,
    dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<ChangeEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    planned_commands: Vec<PlannedEntry>,
    report: &'a RunReport,
}

#[derive(Debug, Serialize)]
struct PlannedEntry {
    command: String,
    cwd: PathBuf,
}

#[derive(Debug, Serialize)]
struct ChangeEntry {
    path: PathBuf,
    change: &'static str,
}

/// Execute the `quilt apply` command.
///
/// 1. Parse the reference and resolve the target tree
/// 2. Build the run configuration (config defaults, then `-o` pairs)
/// 3. Confirm with the user unless `--yes`, `--quiet` or `--dry-run`
/// 4. Lock the target and run the template, or run it against an overlay
/// 5. Print the report
///
/// Past the prompt, SIGINT stops the fetch or command in flight and the run
/// returns [`CliError::Interrupted`] once the checkout and lock are released.
#[instrument(skip_all, fields(reference = %args.reference))]
pub fn execute(
    args: ApplyArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let reference = build_reference(&args, &config)?;
    let target = resolve_target(&args.target)?;
    let run_config = build_run_config(&args, &config, &target)?;

    debug!(
        target = %target.display(),
        app = %run_config.app_name(),
        options = ?run_config.options(),
        remote = reference.is_remote(),
        "Run configured"
    );

    let interactive = !args.yes
        && !args.dry_run
        && !global.quiet
        && output.format() != OutputFormat::Json
        && io::stdin().is_terminal();
    if interactive {
        show_plan(&reference, &target, &run_config, &output)?;
        if !confirm()? {
            return Err(CliError::Cancelled);
        }
    }

    let interrupt = watch_interrupt();
    let resolver = Box::new(
        GitSourceResolver::new()
            .with_git_program(config.git.program.as_str())
            .with_interrupt(&interrupt),
    );
    let loader = Box::new(TomlFragmentLoader::new());

    if args.dry_run {
        return dry_run(resolver, loader, &reference, &target, &run_config, &output, &interrupt);
    }

    let _lock = TargetLock::acquire(&target)?;
    let service = ApplyService::new(
        resolver,
        loader,
        Box::new(LocalFilesystem::new()),
        Box::new(ProcessCommandRunner::new().with_interrupt(&interrupt)),
    );

    let spinner = output.spinner(format!("Applying {reference}"));
    let result = service.apply(&reference, &target, &run_config);
    spinner.finish_and_clear();
    if interrupt.is_raised() {
        return Err(CliError::Interrupted);
    }
    let report = result?;

    info!(run = %report.id, applied = report.applied, skipped = report.skipped, "Run completed");

    print_report(&report, &output)?;
    output.json(&ApplySummary {
        target: &target,
        dry_run: false,
        changes: Vec::new(),
        planned_commands: Vec::new(),
        report: &report,
    })?;
    Ok(())
}

/// Run against an in-memory overlay of the target and list what would change.
fn dry_run(
    resolver: Box<GitSourceResolver>,
    loader: Box<TomlFragmentLoader>,
    reference: &TemplateReference,
    target: &Path,
    run_config: &RunConfig,
    output: &OutputManager,
    interrupt: &Interrupt,
) -> CliResult<()> {
    let base: Arc<dyn Filesystem> = Arc::new(LocalFilesystem::new());
    let overlay = OverlayFilesystem::new(base);
    let runner = DryRunCommandRunner::new();
    let service = ApplyService::new(
        resolver,
        loader,
        Box::new(overlay.clone()),
        Box::new(runner.clone()),
    );

    let spinner = output.spinner(format!("Planning {reference}"));
    let result = service.apply(reference, target, run_config);
    spinner.finish_and_clear();
    if interrupt.is_raised() {
        return Err(CliError::Interrupted);
    }
    let report = result?;

    let changes: Vec<ChangeEntry> = overlay
        .changes()
        .into_iter()
        .map(|(path, kind)| ChangeEntry {
            path: relative_to(&path, target),
            change: match kind {
                ChangeKind::Created => "created",
                ChangeKind::Modified => "modified",
            },
        })
        .collect();
    let planned: Vec<PlannedEntry> = runner
        .planned()
        .into_iter()
        .map(|c| PlannedEntry {
            cwd: relative_to(&c.cwd, target),
            command: c.command,
        })
        .collect();

    output.info(&format!(
        "Dry run: {} file(s) would change in {}",
        changes.len(),
        target.display()
    ))?;
    for change in &changes {
        let mark = if change.change == "created" { "+" } else { "~" };
        output.print(&format!("  {mark} {}", change.path.display()))?;
    }
    if !planned.is_empty() {
        output.print("")?;
        output.print("Commands that would run:")?;
        for entry in &planned {
            if entry.cwd.as_os_str().is_empty() {
                output.print(&format!("  $ {}", entry.command))?;
            } else {
                output.print(&format!("  $ {}  (in {})", entry.command, entry.cwd.display()))?;
            }
        }
    }
    if !report.dependencies_added.is_empty() {
        output.print("")?;
        output.print(&format!(
            "Dependencies that would be added: {}",
            report.dependencies_added.join(", ")
        ))?;
    }

    output.json(&ApplySummary {
        target,
        dry_run: true,
        changes,
        planned_commands: planned,
        report: &report,
    })?;
    Ok(())
}

/// Route SIGINT to a flag instead of terminating the process.
fn watch_interrupt() -> Interrupt {
    let interrupt = Interrupt::new();
    let raiser = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || raiser.raise()) {
        warn!(error = %e, "Failed to install interrupt handler");
    }
    interrupt
}

/// `path` relative to `root`; empty for `root` itself.
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

// ── Argument translation ──────────────────────────────────────────────────────

fn build_reference(args: &ApplyArgs, config: &AppConfig) -> CliResult<TemplateReference> {
    let entry = args
        .entry
        .clone()
        .unwrap_or_else(|| config.defaults.entry.clone());
    Ok(TemplateReference::parse(&args.reference)?.with_entry(entry))
}

fn resolve_target(target: &Path) -> CliResult<PathBuf> {
    match target.canonicalize() {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(CliError::TargetNotFound {
            path: target.to_path_buf(),
        }),
    }
}

/// Config defaults first, so every `-o key=value` overrides per key.
fn build_run_config(args: &ApplyArgs, config: &AppConfig, target: &Path) -> CliResult<RunConfig> {
    let app_name = match &args.app_name {
        Some(name) => name.trim().to_string(),
        None => target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    if app_name.is_empty() {
        return Err(CliError::InvalidInput {
            message: "cannot derive an application name; pass --app-name".into(),
            source: None,
        });
    }

    let mut run_config =
        RunConfig::new(app_name).with_manifest(config.defaults.manifest.as_str());
    for (key, value) in &config.defaults.options {
        run_config = run_config.with_option(key.as_str(), value.as_str());
    }
    for pair in &args.options {
        run_config = run_config.with_option_pair(pair)?;
    }
    Ok(run_config)
}

// ── UI helpers ────────────────────────────────────────────────────────────────

fn show_plan(
    reference: &TemplateReference,
    target: &Path,
    run_config: &RunConfig,
    out: &OutputManager,
) -> CliResult<()> {
    out.header("Apply")?;
    out.print(&format!("  Template:     {reference}"))?;
    out.print(&format!("  Target:       {}", target.display()))?;
    out.print(&format!("  Application:  {}", run_config.app_name()))?;
    out.print(&format!("  Manifest:     {}", run_config.manifest()))?;
    for (key, value) in run_config.options() {
        out.print(&format!("  Option:       {key} = {value}"))?;
    }
    out.print("")?;
    Ok(())
}

fn print_report(report: &RunReport, out: &OutputManager) -> CliResult<()> {
    out.success(&format!(
        "Applied {} action(s), {} already satisfied",
        report.applied, report.skipped
    ))?;
    if !report.dependencies_added.is_empty() {
        out.print(&format!(
            "  Dependencies added: {}",
            report.dependencies_added.join(", ")
        ))?;
    }
    if report.deferred_executed > 0 {
        out.print(&format!(
            "  Deferred actions run: {}",
            report.deferred_executed
        ))?;
    }
    for command in &report.commands {
        out.print(&format!("  $ {command}"))?;
    }
    Ok(())
}

#[cfg(feature = "interactive")]
fn confirm() -> CliResult<bool> {
    dialoguer::Confirm::new()
        .with_prompt("Apply the template?")
        .default(true)
        .interact()
        .map_err(|e| CliError::InvalidInput {
            message: "failed to read confirmation".into(),
            source: Some(Box::new(e)),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm() -> CliResult<bool> {
    use crate::error::IntoCli as _;
    use std::io::Write as _;

    print!("Apply the template? [Y/n] ");
    io::stdout()
        .flush()
        .with_cli_context(|| "failed to flush stdout")?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_cli_context(|| "failed to read confirmation input")?;

    let input = input.trim().to_ascii_lowercase();
    Ok(input.is_empty() || input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(reference: &str, options: &[&str]) -> ApplyArgs {
        ApplyArgs {
            reference: reference.into(),
            target: PathBuf::from("."),
            entry: None,
            options: options.iter().map(|s| s.to_string()).collect(),
            app_name: None,
            dry_run: false,
            yes: true,
        }
    }

    #[test]
    fn app_name_defaults_to_target_directory() {
        let run = build_run_config(&args("t", &[]), &AppConfig::default(), Path::new("/srv/billing_api"))
            .unwrap();
        assert_eq!(run.app_name(), "billing_api");
        assert_eq!(run.manifest(), "Gemfile");
    }

    #[test]
    fn explicit_app_name_wins() {
        let mut a = args("t", &[]);
        a.app_name = Some("Billing API".into());
        let run = build_run_config(&a, &AppConfig::default(), Path::new("/srv/x")).unwrap();
        assert_eq!(run.app_name(), "Billing API");
    }

    #[test]
    fn root_target_without_name_needs_app_name() {
        assert!(matches!(
            build_run_config(&args("t", &[]), &AppConfig::default(), Path::new("/")),
            Err(CliError::InvalidInput { .. })
        ));
    }

    #[test]
    fn cli_options_override_config_defaults() {
        let mut config = AppConfig::default();
        config.defaults.options.insert("database".into(), "postgresql".into());
        config.defaults.options.insert("css".into(), "none".into());
        config.defaults.manifest = "gems.rb".into();

        let run = build_run_config(
            &args("t", &["database=sqlite3"]),
            &config,
            Path::new("/srv/app"),
        )
        .unwrap();
        assert_eq!(run.option("database"), Some("sqlite3"));
        assert_eq!(run.option("css"), Some("none"));
        assert_eq!(run.manifest(), "gems.rb");
    }

    #[test]
    fn malformed_option_is_rejected() {
        let err = build_run_config(&args("t", &["database"]), &AppConfig::default(), Path::new("/a"))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn reference_takes_entry_from_flag_or_config() {
        let mut a = args("./templates/rails-api", &[]);
        let mut config = AppConfig::default();
        assert_eq!(build_reference(&a, &config).unwrap().entry(), Some("template.toml"));

        config.defaults.entry = "base.toml".into();
        assert_eq!(build_reference(&a, &config).unwrap().entry(), Some("base.toml"));

        a.entry = Some("api.toml".into());
        assert_eq!(build_reference(&a, &config).unwrap().entry(), Some("api.toml"));
    }

    #[test]
    fn remote_reference_keeps_its_ref() {
        let reference = build_reference(
            &args("https://github.com/acme/templates.git#v2", &[]),
            &AppConfig::default(),
        )
        .unwrap();
        assert!(reference.is_remote());
        assert_eq!(reference.git_ref(), Some("v2"));
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!(build_reference(&args("  ", &[]), &AppConfig::default()).is_err());
    }

    #[test]
    fn paths_are_reported_relative_to_the_target() {
        let root = Path::new("/srv/app");
        assert_eq!(relative_to(Path::new("/srv/app/config/a.rb"), root), PathBuf::from("config/a.rb"));
        assert_eq!(relative_to(root, root), PathBuf::new());
        assert_eq!(relative_to(Path::new("/elsewhere"), root), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn target_must_be_an_existing_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Gemfile");
        std::fs::write(&file, "").unwrap();

        assert!(resolve_target(dir.path()).is_ok());
        assert!(matches!(resolve_target(&file), Err(CliError::TargetNotFound { .. })));
        assert!(matches!(
            resolve_target(&dir.path().join("missing")),
            Err(CliError::TargetNotFound { .. })
        ));
    }
}
