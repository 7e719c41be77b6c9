//! Livesheet - plain-text calculation sheets that fill in their own results

mod config;
mod default_functions;

use anyhow::{Context, Result, bail};
use livesheet_core::document::{read_sheet, write_sheet};
use livesheet_core::storage::{parse_test_cases, run_cases};
use livesheet_core::{Calculator, Statistics};
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use config::{Settings, load_settings};
use default_functions::prepend_default_functions_if_present;

fn print_usage() {
    eprintln!("Usage: livesheet [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Sheet to calculate in place (- for stdin/stdout)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <TEXT>      Calculate TEXT and print the result");
    eprintln!("  -s, --sections            Only calculate inside ```math / ```calc fences");
    eprintln!("  -o, --output <FILE>       Write the result to FILE instead");
    eprintln!("  -f, --functions <FILE>    Load custom Rhai functions (can be repeated)");
    eprintln!("  --no-default-functions    Skip default.rhai from the config directory");
    eprintln!("  --config <FILE>           Read settings from FILE");
    eprintln!("  --no-config               Ignore config.toml");
    eprintln!("  --stats                   Print statistics to stderr");
    eprintln!("  --test <FILE>             Run the test cases in a markdown file");
    eprintln!("  -V, --version             Print version");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    file: Option<PathBuf>,
    command: Option<String>,
    sections: bool,
    output: Option<PathBuf>,
    functions: Vec<PathBuf>,
    no_default_functions: bool,
    config_file: Option<PathBuf>,
    no_config: bool,
    stats: bool,
    test_file: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Invocation {
    Run(Options),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-V" | "--version" => return Ok(Invocation::Version),
            "-s" | "--sections" => options.sections = true,
            "--no-default-functions" => options.no_default_functions = true,
            "--no-config" => options.no_config = true,
            "--stats" => options.stats = true,
            "-c" | "--command" => {
                i += 1;
                let Some(text) = args.get(i) else {
                    bail!("--command requires text");
                };
                options.command = Some(text.clone());
            }
            "-o" | "--output" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--output requires a file path");
                };
                options.output = Some(PathBuf::from(path));
            }
            "-f" | "--functions" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--functions requires a file path");
                };
                options.functions.push(PathBuf::from(path));
            }
            "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--config requires a file path");
                };
                options.config_file = Some(PathBuf::from(path));
            }
            "--test" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--test requires a file path");
                };
                options.test_file = Some(PathBuf::from(path));
            }
            "-" => {
                if options.file.is_some() {
                    bail!("Unexpected argument: -");
                }
                options.file = Some(PathBuf::from("-"));
            }
            arg if arg.starts_with('-') => bail!("Unknown option: {}", arg),
            arg => {
                if options.file.is_some() {
                    bail!("Unexpected argument: {}", arg);
                }
                options.file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }
    Ok(Invocation::Run(options))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Invocation::Run(options)) => options,
        Ok(Invocation::Help) => {
            print_usage();
            return;
        }
        Ok(Invocation::Version) => {
            println!("livesheet {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match run(&options) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(options: &Options) -> Result<i32> {
    let settings = if options.no_config {
        Settings::default()
    } else {
        let (settings, warnings) = load_settings(options.config_file.as_ref());
        for warning in warnings {
            eprintln!("Warning: {}", warning);
        }
        settings
    };
    let sections = options.sections || settings.sections;
    let mut calc = build_calculator(options, &settings)?;

    if let Some(path) = &options.test_file {
        return run_test_file(path, &calc);
    }

    if let Some(text) = &options.command {
        let out = calculate(&mut calc, text, sections);
        println!("{}", out);
        report(options, calc.statistics());
        return Ok(if calc.statistics().total_errors > 0 { 1 } else { 0 });
    }

    let Some(file) = &options.file else {
        bail!("Nothing to calculate: pass a FILE, - for stdin, or -c TEXT");
    };

    let from_stdin = file.as_os_str() == "-";
    let text = if from_stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        text
    } else {
        read_sheet(file).with_context(|| format!("Failed to read {}", file.display()))?
    };

    let out = calculate(&mut calc, &text, sections);
    match (&options.output, from_stdin) {
        (Some(path), _) => write_output(path, &out)?,
        (None, true) => print!("{}", out),
        (None, false) => write_output(file, &out)?,
    }
    report(options, calc.statistics());
    Ok(0)
}

fn build_calculator(options: &Options, settings: &Settings) -> Result<Calculator> {
    let mut calc = Calculator::default();
    if let Some(precision) = settings.precision {
        calc.engine.set_precision(precision);
    }

    let mut functions = settings.functions.clone();
    functions.extend(options.functions.iter().cloned());
    prepend_default_functions_if_present(&mut functions, options.no_default_functions);
    for path in &functions {
        calc.load_functions(path)
            .with_context(|| format!("Failed to load functions from {}", path.display()))?;
    }
    Ok(calc)
}

fn calculate(calc: &mut Calculator, text: &str, sections: bool) -> String {
    if sections {
        calc.calculate_with_math_sections(text)
    } else {
        calc.calculate(text)
    }
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    write_sheet(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn report(options: &Options, stats: Statistics) {
    if options.stats {
        eprintln!(
            "calculations: {}, results: {}, solo expressions: {}, errors: {}",
            stats.total_calculations,
            stats.total_results_provided,
            stats.total_solo_expressions,
            stats.total_errors
        );
    }
    if stats.needs_usage_hint() {
        eprintln!("Hint: end a line with `=` to see its result, e.g. `5 + 3 =`");
    }
}

/// Run every case on a calculator configured like `template`.
fn run_test_file(path: &Path, template: &Calculator) -> Result<i32> {
    let text = read_sheet(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let cases = parse_test_cases(&text);
    if cases.is_empty() {
        bail!("No test cases found in {}", path.display());
    }

    let precision = template.engine.precision();
    let script = template.custom_functions.clone();
    let outcomes = run_cases(&cases, |calc| {
        calc.engine.set_precision(precision);
        if let Some(script) = &script
            && let Err(err) = calc.engine.load_functions(script)
        {
            tracing::warn!(error = %err, "custom functions failed to load for test case");
        }
    });

    let failed = outcomes.iter().filter(|o| !o.passed).count();
    for outcome in &outcomes {
        if outcome.passed {
            println!("PASS {}", outcome.name);
            continue;
        }
        println!("FAIL {}", outcome.name);
        println!("  expected:");
        for line in outcome.expected.lines() {
            println!("    {}", line);
        }
        println!("  actual:");
        for line in outcome.actual.lines() {
            println!("    {}", line);
        }
    }
    println!("{} passed, {} failed", outcomes.len() - failed, failed);
    Ok(if failed > 0 { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_args_collects_options() {
        let parsed = parse_args(&args(&[
            "-s", "-f", "a.rhai", "--functions", "b.rhai", "-o", "out.md", "sheet.md",
        ]))
        .unwrap();
        let Invocation::Run(options) = parsed else {
            panic!("expected options");
        };
        assert!(options.sections);
        assert_eq!(options.functions, vec![PathBuf::from("a.rhai"), PathBuf::from("b.rhai")]);
        assert_eq!(options.output, Some(PathBuf::from("out.md")));
        assert_eq!(options.file, Some(PathBuf::from("sheet.md")));
    }

    #[test]
    fn parse_args_help_and_version() {
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Invocation::Help);
        assert_eq!(parse_args(&args(&["-V"])).unwrap(), Invocation::Version);
    }

    #[test]
    fn parse_args_errors() {
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["-c"])).is_err());
        assert!(parse_args(&args(&["a.md", "b.md"])).is_err());
    }

    #[test]
    fn parse_args_stdin_marker() {
        let Invocation::Run(options) = parse_args(&args(&["-"])).unwrap() else {
            panic!("expected options");
        };
        assert_eq!(options.file, Some(PathBuf::from("-")));
    }
}
