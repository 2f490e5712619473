//! EV dispatch simulator entry point: CLI wiring and config-driven run.

use std::process;

use ev_dispatch_sim::cli::{self, CliOptions};
use ev_dispatch_sim::config::ScenarioConfig;
use ev_dispatch_sim::io::export::export_csv;
use ev_dispatch_sim::logging::init_logging;
use ev_dispatch_sim::runner::run_scenario;

fn load_scenario(cli: &CliOptions) -> ScenarioConfig {
    // --scenario takes priority, then --preset, then baseline default
    let loaded = if let Some(ref path) = cli.scenario {
        ScenarioConfig::from_toml_file(path)
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn main() {
    let cli = match cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };
    if cli.help {
        cli::print_usage();
        return;
    }

    let mut scenario = load_scenario(&cli);
    if let Some(seed) = cli.seed {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(e) = init_logging(&scenario.logging) {
        eprintln!("error: {e}");
        process::exit(1);
    }

    let output = match run_scenario(&scenario) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for entry in &output.logs {
        println!("{}", entry.result);
    }

    println!("\n{}", output.summary);

    if let Some(ref path) = cli.log_out {
        if let Err(e) = export_csv(&output.logs, path) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Allocation log written to {}", path.display());
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(ev_dispatch_sim::api::AppState { output });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port.unwrap_or(3000)));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(ev_dispatch_sim::api::serve(state, addr)) {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
