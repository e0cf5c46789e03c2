//! Thin CLI layer: parse args, styled output, and call into
//! geppetto-core. Exit code is the number of modules that failed after
//! retries (capped at 255), or 1 on a fatal configuration error.

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use geppetto_core::config::{DEFAULT_CACHE_DIR, DEFAULT_CONFIG_FILE};
use geppetto_core::{
    deploy, install_puppet_files, parser, Cache, Config, Environment, PuppetFile, Settings, Source,
};

// ---- UI helpers (plain text when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn build_cli() -> Command {
    let puppetfile_arg = Arg::new("puppetfile")
        .long("puppetfile")
        .value_name("PATH")
        .default_value("Puppetfile")
        .help("Path to the Puppetfile");

    let workers_arg = Arg::new("workers")
        .long("workers")
        .value_name("N")
        .value_parser(clap::value_parser!(usize))
        .default_value("4")
        .help("Number of modules to download in parallel");

    let retries_arg = Arg::new("retries")
        .long("retries")
        .value_name("N")
        .value_parser(clap::value_parser!(usize))
        .default_value("3")
        .help("Attempts per module before giving up");

    let retry_delay_arg = Arg::new("retry-delay")
        .long("retry-delay")
        .value_name("SECONDS")
        .value_parser(clap::value_parser!(u64))
        .default_value("5")
        .help("Seconds to wait between attempts");

    let moduledir_arg = Arg::new("moduledir")
        .long("moduledir")
        .value_name("PATH")
        .default_value("modules")
        .help("Folder modules are installed into");

    let quiet_arg = Arg::new("quiet")
        .short('q')
        .long("quiet")
        .action(ArgAction::SetTrue)
        .help("Suppress per-module progress lines");

    let install_cmd = |name: &'static str| {
        Command::new(name)
            .about("Install the modules of a single Puppetfile")
            .arg(puppetfile_arg.clone())
            .arg(moduledir_arg.clone())
            .arg(
                Arg::new("no-deps")
                    .long("no-deps")
                    .action(ArgAction::SetTrue)
                    .help("Skip downloading module dependencies"),
            )
            .arg(workers_arg.clone())
            .arg(retries_arg.clone())
            .arg(retry_delay_arg.clone())
            .arg(quiet_arg.clone())
    };

    Command::new("geppetto")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Deploy Puppet environments and modules from Puppetfiles")
        .after_help(
            "Examples:\n  geppetto install\n  geppetto install --puppetfile ./Puppetfile --workers 8\n  geppetto deploy environment production\n  geppetto deploy module apache\n  geppetto puppetfile check",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(install_cmd("install"))
        .subcommand(
            Command::new("deploy")
                .about("Deploy environments or modules from the configured sources")
                .subcommand_required(true)
                .subcommand(
                    Command::new("environment")
                        .about("Check out environment branches and install their Puppetfiles")
                        .arg(
                            Arg::new("environment")
                                .value_name("ENV")
                                .num_args(1..)
                                .required(true)
                                .help("Environment branch(es) to deploy"),
                        )
                        .arg(moduledir_arg.clone())
                        .arg(workers_arg.clone())
                        .arg(retries_arg.clone())
                        .arg(retry_delay_arg.clone())
                        .arg(quiet_arg.clone()),
                )
                .subcommand(
                    Command::new("module")
                        .about("Update named modules in every deployed environment")
                        .arg(
                            Arg::new("module")
                                .value_name("MODULE")
                                .num_args(1..)
                                .required(true)
                                .help("Module name(s) to update"),
                        )
                        .arg(workers_arg.clone())
                        .arg(retries_arg.clone())
                        .arg(retry_delay_arg.clone())
                        .arg(quiet_arg.clone()),
                ),
        )
        .subcommand(
            Command::new("puppetfile")
                .about("Operate on a Puppetfile directly")
                .subcommand_required(true)
                .subcommand(install_cmd("install"))
                .subcommand(
                    Command::new("check")
                        .about("Parse the Puppetfile and report grammar errors")
                        .arg(puppetfile_arg.clone()),
                ),
        )
        .subcommand(Command::new("version").about("Print the version"))
}

/// `--quiet` silences the run log for the rest of the process.
fn apply_quiet(matches: &ArgMatches) {
    let quiet = matches
        .try_get_one::<bool>("quiet")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false);
    if quiet {
        env::set_var("GEPPETTO_QUIET", "1");
    }
}

fn settings_from(matches: &ArgMatches) -> Settings {
    let mut settings = Settings::default();
    if let Some(workers) = matches.try_get_one::<usize>("workers").ok().flatten() {
        settings.workers = (*workers).max(1);
    }
    if let Some(retries) = matches.try_get_one::<usize>("retries").ok().flatten() {
        settings.max_tries = (*retries).max(1);
    }
    if let Some(delay) = matches.try_get_one::<u64>("retry-delay").ok().flatten() {
        settings.retry_delay = Duration::from_secs(*delay);
    }
    if let Some(no_deps) = matches.try_get_one::<bool>("no-deps").ok().flatten() {
        settings.follow_deps = !*no_deps;
    }
    settings
}

fn puppetfile_path(matches: &ArgMatches) -> Result<PathBuf, String> {
    let raw = matches
        .get_one::<String>("puppetfile")
        .map(String::as_str)
        .unwrap_or("Puppetfile");
    std::path::absolute(raw).map_err(|e| format!("could not resolve {}: {}", raw, e))
}

fn moduledir(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("moduledir")
        .cloned()
        .unwrap_or_else(|| "modules".to_string())
}

fn open_cache(dir: &str) -> Result<Arc<Cache>, String> {
    Cache::open(dir)
        .map(Arc::new)
        .map_err(|e| format!("failed creating cache folder {}: {}", dir, e))
}

fn install(matches: &ArgMatches) -> Result<usize, String> {
    apply_quiet(matches);
    let puppetfile = puppetfile_path(matches)?;
    if !puppetfile.is_file() {
        return Err(format!("no such file or directory {}", puppetfile.display()));
    }
    let basedir = puppetfile
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = settings_from(matches);
    settings.puppetfile = Some(puppetfile.clone());
    settings.moduledir = Some(moduledir(matches));

    let cache = open_cache(DEFAULT_CACHE_DIR)?;

    let mut env = Environment::new(Source { basedir, ..Default::default() }, "");
    if let Some(dir) = &settings.moduledir {
        env.modules_folder = dir.clone();
    }

    let files = [PuppetFile::new(puppetfile, env)];
    install_puppet_files(&files, cache, &settings).map_err(|e| e.to_string())
}

fn deploy_environments(matches: &ArgMatches) -> Result<usize, String> {
    apply_quiet(matches);
    let config = Config::load(Path::new(DEFAULT_CONFIG_FILE)).map_err(|e| e.to_string())?;
    let cache = open_cache(config.cache_dir())?;

    let mut settings = settings_from(matches);
    settings.moduledir = Some(moduledir(matches));
    settings.environments = matches
        .get_many::<String>("environment")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let moduledir = settings.moduledir.clone().unwrap_or_else(|| "modules".to_string());
    let mut files = Vec::new();
    for environment in &settings.environments {
        let puppet_file = deploy::prepare_environment(&config, &cache, environment, &moduledir)
            .map_err(|e| format!("failed deploying environment {}: {}", environment, e))?;
        files.push(puppet_file);
    }

    let failures = install_puppet_files(&files, cache, &settings).map_err(|e| e.to_string())?;
    if failures == 0 {
        success(&format!("deployed {} environment(s)", settings.environments.len()));
    }
    Ok(failures)
}

fn deploy_modules(matches: &ArgMatches) -> Result<usize, String> {
    apply_quiet(matches);
    let config = Config::load(Path::new(DEFAULT_CONFIG_FILE)).map_err(|e| e.to_string())?;
    let cache = open_cache(config.cache_dir())?;

    let mut settings = settings_from(matches);
    settings.modules = matches
        .get_many::<String>("module")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let files = deploy::deployed_puppet_files(&config).map_err(|e| e.to_string())?;
    install_puppet_files(&files, cache, &settings).map_err(|e| e.to_string())
}

fn check(matches: &ArgMatches) -> Result<usize, String> {
    let puppetfile = puppetfile_path(matches)?;
    let text = std::fs::read_to_string(&puppetfile)
        .map_err(|e| format!("could not open {}: {}", puppetfile.display(), e))?;
    match parser::parse(&text) {
        Ok(manifest) => {
            success(&format!(
                "{}: OK ({} modules)",
                puppetfile.display(),
                manifest.modules.len()
            ));
            Ok(0)
        }
        Err(e) => Err(format!("{}: {}", puppetfile.display(), e)),
    }
}

fn run(matches: &ArgMatches) -> Result<usize, String> {
    match matches.subcommand() {
        Some(("install", sub)) => install(sub),
        Some(("deploy", sub)) => match sub.subcommand() {
            Some(("environment", sub)) => deploy_environments(sub),
            Some(("module", sub)) => deploy_modules(sub),
            _ => Err("unknown deploy subcommand".to_string()),
        },
        Some(("puppetfile", sub)) => match sub.subcommand() {
            Some(("install", sub)) => install(sub),
            Some(("check", sub)) => check(sub),
            _ => Err("unknown puppetfile subcommand".to_string()),
        },
        Some(("version", _)) => {
            println!("geppetto {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        _ => Err("no subcommand given".to_string()),
    }
}

fn main() {
    let matches = build_cli().get_matches();
    let code = match run(&matches) {
        Ok(failures) => failures.min(255) as i32,
        Err(message) => {
            error(&message);
            1
        }
    };
    process::exit(code);
}
