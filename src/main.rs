//! Command-line driver.
//!
//! With a script argument it runs the file once and exits with a status that
//! says how it went. Without one it reads lines from stdin in a single
//! session, so definitions carry over from one line to the next.

use anyhow::Context;
use clap::{crate_version, App, Arg, ErrorKind};
use log::error;
use rlox::ast::AstPrinter;
use rlox::{Lox, Outcome};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::thread;

const EX_USAGE: i32 = 64;
const EX_NOINPUT: i32 = 74;

// Every guest call recurses on the host stack; this leaves room for
// `MAX_CALL_DEPTH` frames even in unoptimized builds.
const SESSION_STACK_SIZE: usize = 256 * 1024 * 1024;

struct Options {
    script: Option<String>,
    print_ast: bool,
}

fn main() {
    let matches = App::new("rlox")
        .version(crate_version!())
        .about("Tree-walking interpreter for the Lox language")
        .arg(
            Arg::with_name("script")
                .help("Script to run; starts an interactive prompt if omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more detail to stderr (repeat for more)"),
        )
        .arg(
            Arg::with_name("print-ast")
                .long("print-ast")
                .help("Print the syntax tree of each statement instead of running it"),
        )
        .get_matches_safe();
    let matches = match matches {
        Ok(m) => m,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                process::exit(EX_USAGE);
            }
        },
    };

    let level = log_level(matches.occurrences_of("verbose"));
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = Options {
        script: matches.value_of("script").map(String::from),
        print_ast: matches.is_present("print-ast"),
    };
    match run_session(options) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:?}", e);
            eprintln!("Error: {:#}", e);
            process::exit(EX_NOINPUT);
        }
    }
}

/// Default log filter for the number of `-v` flags given.
fn log_level(verbosity: u64) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn run_session(options: Options) -> anyhow::Result<i32> {
    let session = thread::Builder::new()
        .name("rlox".to_string())
        .stack_size(SESSION_STACK_SIZE)
        .spawn(move || match &options.script {
            Some(path) => run_file(path, &options),
            None => run_prompt(&options).map(|()| 0),
        })
        .context("could not start the interpreter thread")?;
    session
        .join()
        .map_err(|_| anyhow::anyhow!("the interpreter thread panicked"))?
}

fn run_file(path: &str, options: &Options) -> anyhow::Result<i32> {
    let source =
        fs::read_to_string(path).with_context(|| format!("could not read '{}'", path))?;
    let mut out = io::stdout();
    let mut lox = Lox::new(&mut out);
    let outcome = run(&mut lox, &source, options);
    Ok(outcome.exit_code())
}

fn run_prompt(options: &Options) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut prompt = io::stdout();
    let mut out = io::stdout();
    let mut lox = Lox::new(&mut out);

    let mut line = String::new();
    loop {
        prompt.write_all(b"> ")?;
        prompt.flush()?;
        line.clear();
        let nbytes = stdin
            .read_line(&mut line)
            .context("could not read from stdin")?;
        if nbytes == 0 {
            break;
        }
        run(&mut lox, &line, options);
    }
    Ok(())
}

fn run(lox: &mut Lox<'_>, source: &str, options: &Options) -> Outcome {
    let outcome = if options.print_ast {
        print_ast(lox, source)
    } else {
        lox.run(source)
    };
    for e in lox.take_errors() {
        eprintln!("{}", e);
    }
    outcome
}

fn print_ast(lox: &mut Lox<'_>, source: &str) -> Outcome {
    match lox.syntax_tree(source) {
        Some(statements) => {
            let mut printer = AstPrinter {};
            for stmt in &statements {
                println!("{}", printer.print_statement(stmt));
            }
            Outcome::Ok
        }
        None => Outcome::StaticError,
    }
}

#[cfg(test)]
mod tests {
    use crate::log_level;

    #[test]
    fn each_verbose_flag_raises_the_log_level() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(2), "trace");
        assert_eq!(log_level(5), "trace");
    }
}
