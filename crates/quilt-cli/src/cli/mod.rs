//! CLI argument definitions using the clap derive API.
//!
//! Argument names, aliases, help text and value enums live here and nowhere
//! else.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "quilt",
    bin_name = "quilt",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Apply declarative template fragments to an application tree",
    long_about = "Quilt resolves a template (local directory or git repository), \
                  runs its fragments against an existing application tree and \
                  records added dependencies and post-assembly steps.",
    after_help = "EXAMPLES:\n\
        \x20 quilt apply ./templates/rails-api -C my_api -o database=sqlite3\n\
        \x20 quilt apply https://github.com/acme/templates.git#v2 --dry-run\n\
        \x20 quilt config list\n\
        \x20 quilt completions bash > ~/.local/share/bash-completion/completions/quilt",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply a template to an application tree.
    #[command(
        visible_alias = "a",
        about = "Apply a template to an application tree",
        after_help = "EXAMPLES:\n\
            \x20 quilt apply ./templates/rails-api -C my_api\n\
            \x20 quilt apply ./templates/rails-api -C my_api -o database=postgresql --yes\n\
            \x20 quilt apply git@github.com:acme/templates.git#main --entry api.toml --dry-run"
    )]
    Apply(ApplyArgs),

    /// Initialise a Quilt configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 quilt init                    # platform config dir\n\
            \x20 quilt init -c ./quilt.toml    # explicit location\n\
            \x20 quilt init --force            # overwrite"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 quilt completions bash > ~/.local/share/bash-completion/completions/quilt\n\
            \x20 quilt completions zsh  > ~/.zfunc/_quilt\n\
            \x20 quilt completions fish > ~/.config/fish/completions/quilt.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the Quilt configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 quilt config get git.program\n\
            \x20 quilt config get defaults.options.database\n\
            \x20 quilt config list"
    )]
    Config(ConfigCommands),
}

// ── apply ─────────────────────────────────────────────────────────────────────

/// Arguments for `quilt apply`.
#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Local path or git URL. Remote refs go after `#` or in a `/tree/<ref>`
    /// segment.
    #[arg(value_name = "REFERENCE", help = "Template directory, file or git URL")]
    pub reference: String,

    #[arg(
        short = 'C',
        long = "target",
        value_name = "DIR",
        default_value = ".",
        help = "Application tree to modify"
    )]
    pub target: PathBuf,

    #[arg(
        long = "entry",
        value_name = "FILE",
        help = "Entry fragment inside the template root (default: template.toml)"
    )]
    pub entry: Option<String>,

    /// Run options, visible to conditionals and as `{{key}}` placeholders.
    #[arg(
        short = 'o',
        long = "option",
        value_name = "KEY=VALUE",
        help = "Set a run option (repeatable)"
    )]
    pub options: Vec<String>,

    /// Defaults to the target directory name.
    #[arg(long = "app-name", value_name = "NAME", help = "Application name")]
    pub app_name: Option<String>,

    #[arg(
        long = "dry-run",
        help = "Show what would change without touching the tree"
    )]
    pub dry_run: bool,

    #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt")]
    pub yes: bool,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `quilt init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `quilt completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `quilt config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `git.program`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the active configuration file.
    Path,
}
