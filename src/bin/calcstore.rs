use std::{env, process};

use calcstore::{CalcStore, cli::CommandLineConfig, open_store};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let store = match open_store(&config.store_config()) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    let code = run_command(&store, &config);
    if let Err(err) = store.close() {
        eprintln!("{err}");
    }
    if code != 0 {
        process::exit(code);
    }
}

fn run_command(store: &CalcStore, config: &CommandLineConfig) -> i32 {
    match calcstore::cli::execute(store, &config.command, &config.command_args) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{text}");
                0
            }
            Err(err) => {
                eprintln!("command failed: {err}");
                1
            }
        },
        Err(err) => {
            if err.is_domain() {
                tracing::debug!(command = %config.command, error = %err, "command rejected");
            } else {
                tracing::error!(command = %config.command, error = %err, "command failed");
            }
            eprintln!("command failed: {err}");
            1
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CALCSTORE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "calcstore=debug,info"
        } else {
            "calcstore=info,warn"
        })
    });

    let format = env::var("CALCSTORE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
