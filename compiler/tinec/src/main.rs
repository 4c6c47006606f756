//! Tine compiler CLI.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tinec::{
    init_tracing, Artifact, CompileOptions, CompileResult, Export, Instance, Session,
    TestRunner, TestRunnerConfig, Value,
};

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match args[1].as_str() {
        "run" => run(&args[2..]),
        "check" => check(&args[2..]),
        "preprocess" => preprocess(&args[2..]),
        "test" => test(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-v" => {
            println!("Tine compiler {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Flags shared by the commands that compile.
#[derive(Default)]
struct Flags<'a> {
    file: Option<&'a str>,
    function: Option<&'a str>,
    args: Vec<&'a str>,
    disasm: bool,
}

fn parse_flags<'a>(
    args: &'a [String],
    options: &mut CompileOptions,
) -> Result<Flags<'a>, String> {
    let mut flags = Flags::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .map(String::as_str)
                .ok_or_else(|| format!("{name} needs a value"))
        };
        match arg.as_str() {
            "--fn" => flags.function = Some(value("--fn")?),
            "--args" => {
                flags.args = value("--args")?
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .collect();
            }
            "--opt" => {
                let ids = value("--opt")?.split(',').map(str::trim).map(String::from);
                *options = options.clone().with_optimizations(ids);
            }
            "--no-opt" => *options = options.clone().without_optimizations(),
            "--debug" => options.debug = true,
            "--disasm" => flags.disasm = true,
            "-D" => {
                let def = value("-D")?;
                let (name, body) = def.split_once('=').unwrap_or((def, "1"));
                options.definitions.push((name.to_string(), body.to_string()));
            }
            other if other.starts_with('-') => return Err(format!("unknown option `{other}`")),
            file if flags.file.is_none() => flags.file = Some(file),
            extra => return Err(format!("unexpected argument `{extra}`")),
        }
    }
    Ok(flags)
}

/// Read the file named by `flags`, reporting problems on stderr.
fn read_source(usage: &str, flags: &Flags<'_>) -> Option<String> {
    let Some(path) = flags.file else {
        eprintln!("error: missing file path");
        eprintln!("Usage: {usage}");
        return None;
    };
    match std::fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("error: cannot read '{path}': {e}");
            None
        }
    }
}

fn setup<'a>(usage: &str, args: &'a [String]) -> Option<(String, Flags<'a>, CompileOptions)> {
    let mut options = CompileOptions::default();
    let flags = match parse_flags(args, &mut options) {
        Ok(flags) => flags,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Usage: {usage}");
            return None;
        }
    };
    let source = read_source(usage, &flags)?;
    Some((source, flags, options))
}

fn compile(source: &str, options: CompileOptions) -> CompileResult {
    let result = Session::new(options).compile(source);
    for diagnostic in &result.diagnostics {
        eprintln!("{diagnostic}");
    }
    result
}

fn print_interface(artifact: &Artifact) {
    for export in artifact.exports() {
        println!("fn {export}");
    }
    for variable in artifact.variables() {
        println!(
            "var {} {} (offset {}, {} bytes)",
            variable.ty, variable.name, variable.offset, variable.size
        );
    }
}

fn check(args: &[String]) -> ExitCode {
    const USAGE: &str =
        "tine check <file.tine> [--opt ids | --no-opt] [--disasm] [-D NAME=VALUE]";
    let Some((source, flags, options)) = setup(USAGE, args) else {
        return ExitCode::FAILURE;
    };
    let result = compile(&source, options);
    let Some(artifact) = result.artifact else {
        return ExitCode::FAILURE;
    };
    print_interface(&artifact);
    if flags.disasm {
        println!();
        print!("{artifact}");
        for stats in artifact.stats() {
            println!(
                "; {}: {} instructions, {} memory-backed registers",
                stats.name,
                stats.instructions,
                stats.memory_backed()
            );
        }
    }
    ExitCode::SUCCESS
}

/// Pick the overload `args` parse for and convert them.
fn select<'a>(
    artifact: &'a Artifact,
    name: &'a str,
    args: &[&str],
) -> Result<(&'a Export, Vec<Value>), String> {
    let mut overloads = artifact.overloads(name).peekable();
    if overloads.peek().is_none() {
        return Err(format!("no function named `{name}`"));
    }
    for export in overloads.filter(|e| e.params.len() == args.len()) {
        let values: Option<Vec<Value>> = export
            .params
            .iter()
            .zip(args)
            .map(|(ty, text)| Value::parse(text, *ty))
            .collect();
        if let Some(values) = values {
            return Ok((export, values));
        }
    }
    Err(format!("no overload of `{name}` takes ({})", args.join(", ")))
}

fn run(args: &[String]) -> ExitCode {
    const USAGE: &str = "tine run <file.tine> [--fn name] [--args a,b] \
                         [--opt ids | --no-opt] [--debug] [-D NAME=VALUE]";
    let Some((source, flags, options)) = setup(USAGE, args) else {
        return ExitCode::FAILURE;
    };
    let debug = options.debug;
    let result = compile(&source, options);
    let Some(artifact) = result.artifact else {
        return ExitCode::FAILURE;
    };

    let Some(name) = flags.function else {
        print_interface(&artifact);
        return ExitCode::SUCCESS;
    };
    let (export, values) = match select(&artifact, name, &flags.args) {
        Ok(selected) => selected,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let signature = export.to_string();

    let mut instance = match Instance::new(Arc::clone(&artifact)) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("{}", e.to_diagnostic());
            return ExitCode::FAILURE;
        }
    };
    if debug {
        instance.set_hook(|line| eprintln!("; line {line}"));
    }
    match instance.call(name, &values) {
        Ok(Some(value)) => println!("{signature} = {value}"),
        Ok(None) => println!("{signature} returned"),
        Err(e) => {
            eprintln!("{}", e.to_diagnostic());
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = instance.destroy() {
        eprintln!("{}", e.to_diagnostic());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn preprocess(args: &[String]) -> ExitCode {
    const USAGE: &str = "tine preprocess <file.tine> [-D NAME=VALUE]";
    let Some((source, _, options)) = setup(USAGE, args) else {
        return ExitCode::FAILURE;
    };
    let session = Session::new(options);
    match session.preprocess(&source) {
        Ok(processed) => {
            for warning in &processed.warnings {
                eprintln!("{warning}");
            }
            print!("{}", processed.text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn test(args: &[String]) -> ExitCode {
    let mut path: Option<&str> = None;
    let mut config = TestRunnerConfig::default();
    for arg in args {
        if let Some(filter) = arg.strip_prefix("--filter=") {
            config.filter = Some(filter.to_string());
        } else if arg == "--verbose" || arg == "-v" {
            config.verbose = true;
        } else if arg == "--no-parallel" {
            config.parallel = false;
        } else if !arg.starts_with('-') && path.is_none() {
            path = Some(arg);
        }
    }
    let path = Path::new(path.unwrap_or("."));

    let summary = TestRunner::new(config.clone()).run(path);
    for result in &summary.results {
        if config.verbose || !result.outcome.is_passed() {
            println!("{} ... {}", result.path.display(), result.outcome);
        }
    }
    println!(
        "\n{} passed, {} failed ({:.2?})",
        summary.passed(),
        summary.failed(),
        summary.duration
    );
    if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_usage() {
    println!("Tine compiler");
    println!();
    println!("Usage: tine <command> [options]");
    println!();
    println!("Commands:");
    println!("  run <file.tine>          Compile, then call a function");
    println!("  check <file.tine>        Compile and list the exported interface");
    println!("  preprocess <file.tine>   Print the preprocessed source");
    println!("  test [path]              Run .tine test-case files (default: .)");
    println!("  help                     Show this help message");
    println!("  version                  Show version information");
    println!();
    println!("Compile options:");
    println!("  --opt <ids>              Comma separated optimizations to enable");
    println!("  --no-opt                 Disable every optimization");
    println!("  --debug                  Statement hooks and optimization notes");
    println!("  -D NAME[=VALUE]          Add a preprocessor definition");
    println!("  --disasm                 (check) Print the generated code");
    println!();
    println!("Run options:");
    println!("  --fn <name>              Function to call");
    println!("  --args <a,b,...>         Arguments, parsed by the parameter types");
    println!();
    println!("Test options:");
    println!("  --filter=<pattern>       Only run files whose path contains pattern");
    println!("  --verbose, -v            List passing files too");
    println!("  --no-parallel            Run files one at a time");
    println!();
    println!("Examples:");
    println!("  tine run gain.tine --fn process --args 0.5");
    println!("  tine check gain.tine --disasm --no-opt");
    println!("  tine test tests/cases --filter=index");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn flags_borrow_from_the_arguments() {
        let args = strings(&["gain.tine", "--fn", "process", "--args", "1, 2.5", "-D", "N=4"]);
        let mut options = CompileOptions::default();
        let flags = parse_flags(&args, &mut options).unwrap();
        assert_eq!(flags.file, Some("gain.tine"));
        assert_eq!(flags.function, Some("process"));
        assert_eq!(flags.args, vec!["1", "2.5"]);
        assert_eq!(options.definitions, vec![("N".to_string(), "4".to_string())]);

        let bad = strings(&["a.tine", "--fn"]);
        assert!(parse_flags(&bad, &mut options).is_err());
    }

    #[test]
    fn select_picks_the_overload_the_arguments_parse_for() {
        let src = "int f(int a) { return a; } double f(double a, double b) { return a + b; }";
        let artifact = Session::default().compile(src).artifact.unwrap();
        let name = String::from("f");

        let (export, values) = select(&artifact, &name, &["1.5", "2"]).unwrap();
        assert_eq!(export.to_string(), "double f(double, double)");
        assert_eq!(values, vec![Value::Double(1.5), Value::Double(2.0)]);

        let (export, _) = select(&artifact, &name, &["7"]).unwrap();
        assert_eq!(export.to_string(), "int f(int)");
        assert!(select(&artifact, "g", &[]).is_err());
    }
}
