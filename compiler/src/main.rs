use clap::Parser;
use std::path::PathBuf;

use bdc::config::CompilerOptions;
use bdc::pipeline::EmitTarget;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Signals,
    Types,
    Json,
    Dot,
    Manifest,
    BuildInfo,
}

impl From<EmitStage> for EmitTarget {
    fn from(stage: EmitStage) -> Self {
        match stage {
            EmitStage::Signals => EmitTarget::Signals,
            EmitStage::Types => EmitTarget::Types,
            EmitStage::Json => EmitTarget::Json,
            EmitStage::Dot => EmitTarget::Dot,
            EmitStage::Manifest => EmitTarget::Manifest,
            EmitStage::BuildInfo => EmitTarget::BuildInfo,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "bdc",
    version,
    about = "Block-diagram compiler core: propagates box diagrams into typed signal graphs"
)]
struct Cli {
    /// Notation source file
    source: Option<PathBuf>,

    /// Compile an inline expression (as `process = <EXPR>;`)
    #[arg(short = 'e', long = "expr", conflicts_with = "source")]
    expr: Option<String>,

    /// Definition to compile
    #[arg(long, default_value = "process")]
    entry: String,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Types)]
    emit: EmitStage,

    /// Output file path (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON options file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Narrowing passes before widening
    #[arg(long)]
    narrowing_limit: Option<u32>,

    /// Widening iterations before a bound is forced
    #[arg(long)]
    widening_limit: Option<u32>,

    /// Check that delays are bounded and non-negative
    #[arg(long)]
    causality: bool,

    /// Use widget ranges as signal intervals
    #[arg(long)]
    range_ui: bool,

    /// Treat `control`/`enable` as plain signals
    #[arg(long)]
    no_control: bool,

    /// Flush-to-zero mode (0 = off, 1 = comparison, 2 = bit-mask)
    #[arg(long)]
    ftz: Option<u32>,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "bdc=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_options(cli: &Cli) -> Result<CompilerOptions, bdc::diag::Diagnostic> {
    let mut options = match &cli.config {
        Some(path) => CompilerOptions::load(path)?,
        None => CompilerOptions::default(),
    };
    if let Some(n) = cli.narrowing_limit {
        options.narrowing_limit = n;
    }
    if let Some(n) = cli.widening_limit {
        options.widening_limit = n;
    }
    if let Some(mode) = cli.ftz {
        options.ftz_mode = mode;
    }
    options.causality |= cli.causality;
    options.range_ui |= cli.range_ui;
    if cli.no_control {
        options.enable_control = false;
    }
    options.validate()?;
    Ok(options)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = match load_options(&cli) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("bdc: {}", e);
            std::process::exit(2);
        }
    };

    let target: EmitTarget = cli.emit.into();

    // ── Manifest needs no source ──
    if target == EmitTarget::Manifest {
        let registry = bdc::registry::Registry::with_builtins();
        write_output(&cli, &registry.manifest());
        return;
    }

    // ── Read source ──
    let source = match (&cli.expr, &cli.source) {
        (Some(expr), _) => format!("{} = {};", cli.entry, expr),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("bdc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        (None, None) => {
            eprintln!("bdc: error: no source given");
            std::process::exit(2);
        }
    };

    if cli.verbose {
        eprintln!("bdc: entry = {}", cli.entry);
        eprintln!("bdc: emit  = {:?}", cli.emit);
    }

    // ── Compile ──
    let Some(terminal) = target.terminal() else {
        return;
    };
    let (session, dsp) =
        match bdc::pipeline::compile_source(&source, &cli.entry, options, terminal) {
            Ok(r) => r,
            Err(diags) => {
                for d in &diags {
                    eprintln!("bdc: {}", d);
                }
                std::process::exit(1);
            }
        };

    if cli.verbose {
        let st = dsp.stats;
        eprintln!(
            "bdc: {} inputs, {} outputs, {} derivations, {} memo hits",
            dsp.inputs,
            dsp.outputs.len(),
            st.derivations,
            st.memo_hits
        );
        eprintln!(
            "bdc: {} recursive groups, {} widening iterations, {} forced jumps",
            st.groups_solved, st.widening_iterations, st.forced_jumps
        );
    }

    match bdc::pipeline::emit(target, &source, &session, &dsp) {
        Ok(text) => write_output(&cli, &text),
        Err(e) => {
            eprintln!("bdc: {}", e);
            std::process::exit(1);
        }
    }
}

fn write_output(cli: &Cli, text: &str) {
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("bdc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
    }
}
