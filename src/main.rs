use clap::{Arg, Command};
use lento::{logging, repl, runner, RunOptions};
use std::fs;
use std::path::Path;
use std::process;

/// Exit status when the script itself cannot be read.
const EXIT_IO_ERROR: i32 = 74;

fn main() {
    let matches = Command::new("lento")
        .about("A small scripting language with closures, arrays and objects")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-tokens")
                .long("dump-tokens")
                .help("Print the token stream to stderr before evaluating")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .help("Print the syntax tree to stderr before evaluating")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("FILTER")
                .help("Tracing filter, e.g. 'debug' or 'lento::evaluator=trace' (overrides RUST_LOG)"),
        )
        .get_matches();

    logging::init_tracing(matches.get_one::<String>("log").map(String::as_str));

    let options = RunOptions {
        dump_tokens: matches.get_flag("dump-tokens"),
        dump_ast: matches.get_flag("dump-ast"),
    };

    match matches.get_one::<String>("file") {
        Some(file_path) if !matches.get_flag("interactive") => run_file(file_path, options),
        _ => repl::start(options),
    }
}

fn run_file(path: &str, options: RunOptions) {
    let path = Path::new(path);

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            process::exit(EXIT_IO_ERROR);
        }
    };

    let filename = path.display().to_string();
    if let Err(error) = runner::run(&source, Some(&filename), options) {
        if error.report(&source, Some(&filename)).is_err() {
            eprintln!("{}", error);
        }
        process::exit(error.exit_code());
    }
}
