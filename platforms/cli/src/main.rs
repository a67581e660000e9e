use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tmbot::{
    Dialect, Engine, EngineConfig, Phase, Program, ProgramLoader, RunSnapshot, SimulatedBand,
    Symbol,
};

#[derive(Parser)]
#[clap(author, version, about = "Turing machine band robot toolkit", long_about = None, arg_required_else_help = true)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a program, printing its diagnostics
    Check {
        /// Program file, or `-` to read from stdin
        file: String,

        /// Input dialect
        #[clap(short, long, value_enum, default_value_t = DialectArg::Flat)]
        dialect: DialectArg,
    },
    /// Execute a program on the simulated band
    Run {
        /// Program file, or `-` to read from stdin
        file: String,

        /// Input dialect
        #[clap(short, long, value_enum, default_value_t = DialectArg::Flat)]
        dialect: DialectArg,

        /// Initial band content, e.g. `0110`; `_` for blank positions
        #[clap(short, long, default_value = "")]
        band: String,

        /// Number of band positions
        #[clap(long, default_value_t = 16)]
        band_length: usize,

        /// Robot speed (1..=10)
        #[clap(short, long, default_value_t = 5)]
        speed: u8,

        /// Print snapshots as JSON lines instead of text
        #[clap(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Tabular,
    Flat,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Tabular => Dialect::Tabular,
            DialectArg::Flat => Dialect::Flat,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { file, dialect } => check(&file, dialect.into()),
        Command::Run {
            file,
            dialect,
            band,
            band_length,
            speed,
            json,
        } => run(&file, dialect.into(), &band, band_length, speed, json),
    }
}

fn load(file: &str, dialect: Dialect) -> Result<Program, String> {
    if file == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("reading program text from stdin; finish with Ctrl-D");
        }
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        let (program, _) = ProgramLoader::load_program_from_string(&text, dialect);
        Ok(program)
    } else {
        let (program, _) = ProgramLoader::load_program(Path::new(file), dialect)
            .map_err(|e| e.to_string())?;
        Ok(program)
    }
}

fn print_diagnostics(program: &Program) {
    for warning in &program.diagnostics.warnings {
        println!("warning: {warning}");
    }
    for error in &program.diagnostics.errors {
        println!("error: {error}");
    }
}

fn check(file: &str, dialect: Dialect) -> ExitCode {
    let program = match load(file, dialect) {
        Ok(program) => program,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    print_diagnostics(&program);
    if program.is_runnable() {
        println!(
            "{}: ok ({} transitions, {} warning(s))",
            program.name,
            program.transitions.len(),
            program.diagnostics.warnings.len()
        );
        ExitCode::SUCCESS
    } else {
        println!(
            "{}: rejected with {} error(s)",
            program.name,
            program.diagnostics.errors.len()
        );
        ExitCode::FAILURE
    }
}

fn parse_band(band: &str, band_length: usize) -> Result<Vec<Symbol>, String> {
    let mut cells = Vec::with_capacity(band_length);
    for c in band.chars() {
        let symbol = match c {
            '0' => Symbol::Zero,
            '1' => Symbol::One,
            '_' | ' ' => Symbol::Blank,
            _ => return Err(format!("invalid band symbol '{c}'; use 0, 1 or _")),
        };
        cells.push(symbol);
    }
    if cells.len() > band_length {
        return Err(format!(
            "band content has {} symbols but the band only has {band_length} positions",
            cells.len()
        ));
    }
    cells.resize(band_length, Symbol::Blank);
    Ok(cells)
}

fn run(
    file: &str,
    dialect: Dialect,
    band: &str,
    band_length: usize,
    speed: u8,
    json: bool,
) -> ExitCode {
    let program = match load(file, dialect) {
        Ok(program) => program,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };
    print_diagnostics(&program);

    let cells = match parse_band(band, band_length) {
        Ok(cells) => cells,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let config = EngineConfig {
        band_length,
        ..EngineConfig::default()
    };
    let hardware = SimulatedBand::with_cells(cells, config.steps_per_position);

    let mut engine = match Engine::new(program, config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    engine.subscribe(Arc::new(move |snapshot: &RunSnapshot| {
        if json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("failed to serialize snapshot: {e}"),
            }
        } else {
            println!(
                "[{:?}] state={} step={} pos={} speed={}",
                snapshot.phase,
                snapshot.current_state,
                snapshot.step_count,
                snapshot.band_position,
                snapshot.speed
            );
        }
    }));

    if let Err(e) = engine.set_speed(speed) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = engine.start(Box::new(hardware)) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    engine.join();

    let outcome = engine.snapshot();
    for error in &outcome.errors {
        eprintln!("{error}");
    }
    println!(
        "{}: {:?} after {} step(s)",
        outcome.program_name, outcome.phase, outcome.step_count
    );
    if outcome.phase == Phase::Accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
