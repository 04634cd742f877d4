use anyhow::Result;
use callspan::config::{load_config, CallScope, LuaTerminator, StructuredEnd};
use callspan::report::{render_json, render_text};
use callspan::scanner::scan_tree_with_progress;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "callspan")]
#[command(version)]
#[command(about = "Find self-recursive definitions of named functions across a multi-language source tree")]
struct Cli {
    /// Directory (or single file) to scan
    #[arg(value_name = "ROOT", default_value = ".")]
    root: PathBuf,

    /// Function or method name to look for (repeatable)
    #[arg(long = "name", short = 'n', value_name = "NAME", required = true, num_args = 1..)]
    names: Vec<String>,

    /// Emit the full result as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Print each file to stderr as it is processed
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Where a self-call must appear (overrides .callspan.json)
    #[arg(long, value_enum)]
    call_scope: Option<CallScope>,

    /// End-line rule for Python/Java definitions (overrides .callspan.json)
    #[arg(long, value_enum)]
    structured_end: Option<StructuredEnd>,

    /// How Lua function bodies are terminated (overrides .callspan.json)
    #[arg(long, value_enum)]
    lua_terminator: Option<LuaTerminator>,

    /// Directory name to skip anywhere in the tree (repeatable)
    #[arg(long, value_name = "DIR")]
    exclude_dir: Vec<String>,

    /// Honour .gitignore/.ignore files and skip hidden entries
    #[arg(long)]
    respect_ignore: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = if cli.root.is_file() {
        cli.root.parent().map(PathBuf::from).unwrap_or_default()
    } else {
        cli.root.clone()
    };
    let mut cfg = load_config(&config_dir);

    if let Some(scope) = cli.call_scope {
        cfg.analysis.call_scope = scope;
    }
    if let Some(end) = cli.structured_end {
        cfg.analysis.structured_end = end;
    }
    if let Some(term) = cli.lua_terminator {
        cfg.analysis.lua_terminator = term;
    }
    cfg.scan.exclude_dir_names.extend(cli.exclude_dir.iter().cloned());
    if cli.respect_ignore {
        cfg.scan.respect_ignore_files = true;
    }

    let verbose = cli.verbose;
    let result = scan_tree_with_progress(&cli.root, &cli.names, &cfg, |path| {
        if verbose {
            eprintln!("Processing file: {}", path.display());
        }
    })?;

    if verbose {
        for skipped in &result.skipped {
            eprintln!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    if cli.json {
        println!("{}", render_json(&result)?);
    } else {
        print!("{}", render_text(&result));
    }

    Ok(())
}
