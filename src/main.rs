use std::fs;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser as CliParser, Subcommand};
use walkdir::WalkDir;

use sablon::{Lexer, Parser, Registry};

#[derive(CliParser)]
#[command(name = "sablon", version, about = "Template compiler front end")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize templates and print the token stream
    Tokenize {
        /// Template file or directory of .twig files
        input: Option<PathBuf>,
        /// Read the template from standard input
        #[arg(long)]
        stdin: bool,
        /// Print tokens as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse templates and print the AST
    Parse {
        /// Template file or directory of .twig files
        input: Option<PathBuf>,
        /// Read the template from standard input
        #[arg(long)]
        stdin: bool,
        /// Print the AST as JSON
        #[arg(long)]
        json: bool,
        /// Print the compiled output instead of the AST
        #[arg(long)]
        compile: bool,
    },
}

enum Mode {
    Tokenize { json: bool },
    Parse { json: bool, compile: bool },
}

fn main() {
    let cli = Cli::parse();
    let registry = Registry::with_defaults();

    let result = match cli.command {
        Commands::Tokenize { input, stdin, json } => {
            run(&registry, input, stdin, &Mode::Tokenize { json })
        }
        Commands::Parse {
            input,
            stdin,
            json,
            compile,
        } => run(&registry, input, stdin, &Mode::Parse { json, compile }),
    };

    if let Err(message) = result {
        eprintln!("error: {}", message);
        process::exit(1);
    }
}

fn run(registry: &Registry, input: Option<PathBuf>, stdin: bool, mode: &Mode) -> Result<(), String> {
    let path = match (stdin, input) {
        (true, _) | (false, None) => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(|err| err.to_string())?;
            return process_source(registry, &source, None, mode);
        }
        (false, Some(path)) => path,
    };

    if path.is_file() {
        return process_file(registry, &path, mode);
    }

    // directory mode: every .twig file under the root
    let started = Instant::now();
    let mut processed = 0usize;
    let mut failed = 0usize;
    for entry in WalkDir::new(&path).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file = entry.path();
        if file.extension().and_then(|ext| ext.to_str()) != Some("twig") {
            continue;
        }
        match process_file(registry, file, mode) {
            Ok(()) => {
                processed += 1;
                println!("✓ {}", file.display());
            }
            Err(message) => {
                failed += 1;
                println!("✗ {}: {}", file.display(), message);
            }
        }
    }
    print_summary(processed, failed, started.elapsed());

    if failed > 0 {
        return Err(format!("{} template(s) failed", failed));
    }
    Ok(())
}

fn process_file(registry: &Registry, path: &Path, mode: &Mode) -> Result<(), String> {
    let source = fs::read_to_string(path).map_err(|err| format!("{}: {}", path.display(), err))?;
    let name = path.to_string_lossy();
    process_source(registry, &source, Some(&name), mode)
}

fn process_source(
    registry: &Registry,
    source: &str,
    name: Option<&str>,
    mode: &Mode,
) -> Result<(), String> {
    let lexer = Lexer::new(registry);
    let stream = lexer.tokenize(source, name).map_err(|err| err.to_string())?;

    match mode {
        Mode::Tokenize { json } => {
            if *json {
                let out = serde_json::to_string_pretty(stream.tokens())
                    .map_err(|err| err.to_string())?;
                println!("{}", out);
            } else {
                for token in stream.tokens() {
                    println!("{:4}  {}", token.line, token);
                }
            }
        }
        Mode::Parse { json, compile } => {
            let mut parser = Parser::new(registry);
            let module = parser.parse(stream).map_err(|err| err.to_string())?;
            if *compile {
                print!("{}", module.compile_to_string());
            } else if *json {
                let out =
                    serde_json::to_string_pretty(&module).map_err(|err| err.to_string())?;
                println!("{}", out);
            } else {
                println!("{:#?}", module);
            }
        }
    }
    Ok(())
}

fn print_summary(processed: usize, failed: usize, elapsed: Duration) {
    println!();
    println!(
        "{} processed, {} failed in {}",
        processed,
        failed,
        format_duration(elapsed)
    );
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
