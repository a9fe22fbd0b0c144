//! Phasefold CLI
//!
//! Command-line interface for the Phasefold library.
//! Provides an interactive shell for loading column data and phase averaging it.

use clap::{Arg, Command};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use phasefold_lib::{
    column_io, phase_average, spectral,
    utils::{self, presets},
    EmptyBinPolicy, OwnedSeries, PhaseAverageConfig, PhaseAverageResult, PhaseUnit,
    ReductionMode, StatisticsMode,
};

/// Application state
struct AppState {
    config: PhaseAverageConfig,
    series: Option<OwnedSeries>,
    current_file: Option<String>,
    result: Option<PhaseAverageResult>,
}

impl AppState {
    fn new() -> Self {
        Self {
            config: PhaseAverageConfig::default(),
            series: None,
            current_file: None,
            result: None,
        }
    }

    /// Replace the configuration, dropping a result computed with the old one
    fn set_config(&mut self, config: PhaseAverageConfig) {
        self.config = config;
        self.result = None;
    }
}

/// Print the help message showing available commands
fn print_help() {
    println!("Available commands:");
    println!("  load <filename>                    - Load a column file (time, value columns...)");
    println!("  save <filename> [unit]             - Save the last phase average result");
    println!("  info                               - Show information about the loaded series");
    println!("  crop <lower|-> <upper|->           - Keep samples within a time range");
    println!("  derive_dt                          - Derive per-sample time steps from time");
    println!("  config                             - Show current configuration");
    println!("  set <parameter> <value>            - Change a configuration parameter");
    println!("  preset <name>                      - Load a configuration preset");
    println!("  presets                            - List available presets");
    println!("  average                            - Phase average the loaded series");
    println!("  show [component]                   - Print the last result table");
    println!("  spectrum [component]               - Show dominant frequency and phase");
    println!("  status                             - Show session status");
    println!("  help                               - Show this help message");
    println!("  quit                               - Exit the program");
    println!();
    println!("Parameters:");
    println!("  frequency <hz>                     - Repetition frequency (> 0)");
    println!("  bins <n>                           - Number of phase bins");
    println!("  offset <value|auto>                - Bin center offset (auto = half a bin)");
    println!("  phase_offset <value>               - Phase at t = 0");
    println!("  unit <degrees|cycles>              - Phase unit");
    println!("  statistics <scalar|covariance>     - Per-bin statistics");
    println!("  weighting <count|time>             - Sample weighting (time needs dt)");
    println!("  empty <zero|nan|auto>              - Value reported for empty bins");
    println!("  wraparound <on|off>                - Duplicate the phase 0 bin at one period");
    println!("  remove_offset <on|off>             - Spectral phase offset removal");
    println!("  sparse <n>                         - Sparse bin threshold");
    println!("  reference <component>              - Component used for spectral estimates");
    println!();
    println!("Examples:");
    println!("  load probe.dat");
    println!("  set frequency 12.5");
    println!("  set bins 72");
    println!("  preset field");
    println!("  crop 0.5 -");
    println!("  average");
    println!("  save averaged.dat cycles");
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_limit(value: &str) -> Result<Option<f64>, String> {
    if value == "-" {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("Invalid time limit: {}", value))
}

/// Apply `set <param> <value>` to a copy of the configuration
fn apply_setting(
    config: &PhaseAverageConfig,
    param: &str,
    value: &str,
) -> Result<PhaseAverageConfig, String> {
    let mut config = *config;
    let parse_f64 = |v: &str| v.parse::<f64>().map_err(|_| format!("Invalid number: {}", v));
    let parse_usize = |v: &str| v.parse::<usize>().map_err(|_| format!("Invalid count: {}", v));
    let parse_on_off = |v: &str| parse_switch(v).ok_or(format!("Expected on/off, got {}", v));

    match param {
        "frequency" => config.frequency = parse_f64(value)?,
        "bins" => config.number_of_bins = parse_usize(value)?,
        "offset" => {
            config.bin_center_offset = if value == "auto" {
                None
            } else {
                Some(parse_f64(value)?)
            }
        }
        "phase_offset" => config.phase_offset = parse_f64(value)?,
        "unit" => {
            let unit = PhaseUnit::from_name(value).ok_or(format!("Unknown unit: {}", value))?;
            // Keep angles meaning the same phase in the new unit
            config.phase_offset = config.unit.convert(config.phase_offset, unit);
            config.bin_center_offset = config
                .bin_center_offset
                .map(|offset| config.unit.convert(offset, unit));
            config.unit = unit;
        }
        "statistics" => {
            config.statistics = match value {
                "scalar" => StatisticsMode::Scalar,
                "covariance" | "vector" => StatisticsMode::VectorCovariance,
                _ => return Err(format!("Unknown statistics mode: {}", value)),
            }
        }
        "weighting" => {
            config.reduction = match value {
                "count" => ReductionMode::CountWeighted,
                "time" => ReductionMode::TimeWeighted,
                _ => return Err(format!("Unknown weighting: {}", value)),
            }
        }
        "empty" => {
            config.empty_bins = match value {
                "zero" => Some(EmptyBinPolicy::Zero),
                "nan" => Some(EmptyBinPolicy::Nan),
                "auto" => None,
                _ => return Err(format!("Unknown empty bin policy: {}", value)),
            }
        }
        "wraparound" => config.include_wraparound = parse_on_off(value)?,
        "remove_offset" => config.remove_phase_offset = parse_on_off(value)?,
        "sparse" => config.sparse_bin_threshold = parse_usize(value)?,
        "reference" => config.reference_component = parse_usize(value)?,
        _ => return Err(format!("Unknown parameter: {}", param)),
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn print_result_table(result: &PhaseAverageResult, component: usize) {
    if component >= result.components() {
        println!(
            "Component {} out of range ({} components)",
            component,
            result.components()
        );
        return;
    }

    let unit = result.unit();
    let means = result.mean(component);
    let stds = result.std(component);
    println!(
        "{:>14} {:>8} {:>16} {:>16}",
        format!("phase [{}]", unit),
        "count",
        "mean",
        "std"
    );
    for (((midpoint, count), mean), std) in result
        .midpoints()
        .iter()
        .zip(result.counts())
        .zip(means)
        .zip(stds)
    {
        println!(
            "{:>14.4} {:>8} {:>16.6e} {:>16.6e}",
            midpoint, count, mean, std
        );
    }
}

fn load_file(state: &mut AppState, filename: &str) {
    println!("Loading file: {}", filename);
    match column_io::read_columns(filename) {
        Ok(series) => {
            println!(
                "Loaded {} samples with {} components",
                series.len(),
                series.components
            );
            state.series = Some(series);
            state.current_file = Some(filename.to_string());
            state.result = None;
        }
        Err(e) => println!("Error loading file: {}", e),
    }
}

/// Process a user command
fn process_command(command: &str, state: &mut AppState) {
    let parts: Vec<&str> = command.split_whitespace().collect();

    if parts.is_empty() {
        return;
    }
    log::debug!("Processing command: {:?}", parts);

    match parts[0] {
        "load" => {
            if parts.len() != 2 {
                println!("Usage: load <filename>");
                return;
            }
            load_file(state, parts[1]);
        }

        "save" => {
            if parts.len() < 2 || parts.len() > 3 {
                println!("Usage: save <filename> [degrees|cycles]");
                return;
            }

            let Some(result) = &state.result else {
                println!("No result available. Run 'average' first.");
                return;
            };

            let unit = match parts.get(2) {
                Some(name) => match PhaseUnit::from_name(name) {
                    Some(unit) => unit,
                    None => {
                        println!("Unknown unit: {}", name);
                        return;
                    }
                },
                None => result.unit(),
            };

            println!("Saving to file: {}", parts[1]);
            match column_io::write_result(parts[1], result, unit) {
                Ok(_) => println!("File saved successfully!"),
                Err(e) => println!("Error saving file: {}", e),
            }
        }

        "info" => match &state.series {
            Some(series) => {
                println!("Series:");
                if let Some(file) = &state.current_file {
                    println!("  File: {}", file);
                }
                println!("  Samples: {}", series.len());
                println!("  Components: {}", series.components);
                if let (Some(first), Some(last)) = (series.time.first(), series.time.last()) {
                    println!(
                        "  Time span: {} .. {} ({})",
                        first,
                        last,
                        utils::format_time(last - first)
                    );
                    println!(
                        "  Cycles at {}: {:.2}",
                        utils::format_frequency(state.config.frequency),
                        (last - first) * state.config.frequency
                    );
                }
                println!("  Time steps: {}", if series.dt.is_some() { "yes" } else { "no" });
            }
            None => println!("No series loaded."),
        },

        "crop" => {
            if parts.len() != 3 {
                println!("Usage: crop <lower|-> <upper|->");
                return;
            }
            let Some(series) = state.series.as_mut() else {
                println!("No series loaded.");
                return;
            };
            match (parse_limit(parts[1]), parse_limit(parts[2])) {
                (Ok(lower), Ok(upper)) => {
                    series.crop_by_time(lower, upper);
                    state.result = None;
                    println!("{} samples remain", series.len());
                }
                (Err(e), _) | (_, Err(e)) => println!("{}", e),
            }
        }

        "derive_dt" => match state.series.as_mut() {
            Some(series) => {
                series.derive_dt();
                println!("Derived time steps for {} samples", series.len());
            }
            None => println!("No series loaded."),
        },

        "config" => print!("{}", utils::config_summary(&state.config)),

        "set" => {
            if parts.len() != 3 {
                println!("Usage: set <parameter> <value>");
                println!("Type 'help' for the list of parameters");
                return;
            }

            match apply_setting(&state.config, parts[1], parts[2]) {
                Ok(config) => {
                    state.set_config(config);
                    println!("Set {} to {}", parts[1], parts[2]);
                }
                Err(e) => println!("Error: {}", e),
            }
        }

        "preset" => {
            if parts.len() != 2 {
                println!("Usage: preset <name>");
                return;
            }
            match presets::find(parts[1]) {
                Some(preset) => {
                    // Presets describe binning, the frequency belongs to the data
                    let config = PhaseAverageConfig {
                        frequency: state.config.frequency,
                        ..preset
                    };
                    state.set_config(config);
                    println!("Loaded preset: {}", parts[1]);
                }
                None => println!("Unknown preset: {}. Type 'presets' to list them.", parts[1]),
            }
        }

        "presets" => {
            println!("Available presets:");
            for preset in presets::list_presets() {
                println!("  {} {:<14} - {}", preset.id, preset.name, preset.description);
            }
        }

        "average" => {
            let Some(series) = &state.series else {
                println!("No series loaded. Load a file first.");
                return;
            };

            let view = match series.as_series() {
                Ok(view) => view,
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            };

            utils::check_config_for_series(&state.config, &view);
            match phase_average(&view, &state.config) {
                Ok(result) => {
                    println!("{}", result.summary());
                    state.result = Some(result);
                }
                Err(e) => println!("Error averaging: {}", e),
            }
        }

        "show" => {
            let component = match parts.get(1).map(|v| v.parse::<usize>()) {
                None => 0,
                Some(Ok(c)) => c,
                Some(Err(_)) => {
                    println!("Usage: show [component]");
                    return;
                }
            };
            match &state.result {
                Some(result) => print_result_table(result, component),
                None => println!("No result available. Run 'average' first."),
            }
        }

        "spectrum" => {
            let Some(series) = &state.series else {
                println!("No series loaded.");
                return;
            };
            let component = match parts.get(1).map(|v| v.parse::<usize>()) {
                None => state.config.reference_component,
                Some(Ok(c)) if c < series.components => c,
                _ => {
                    println!("Usage: spectrum [component < {}]", series.components);
                    return;
                }
            };

            let view = match series.as_series() {
                Ok(view) => view,
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            };
            let signal = view.component(component);

            match spectral::dominant_frequency(&series.time, &signal) {
                Ok(f) => println!("Dominant frequency: {}", utils::format_frequency(f)),
                Err(e) => println!("Error: {}", e),
            }
            match spectral::amplitude_and_phase_at_frequency(
                &series.time,
                &signal,
                state.config.frequency,
            ) {
                Ok((amplitude, phase)) => println!(
                    "At {}: amplitude {:.6e}, phase {}",
                    utils::format_frequency(state.config.frequency),
                    amplitude,
                    utils::format_phase(phase.to_degrees(), PhaseUnit::Degrees)
                ),
                Err(e) => println!("Error: {}", e),
            }
            match spectral::estimate_phase_correction(&series.time, &signal, state.config.frequency)
            {
                Ok(correction) => println!(
                    "Phase offset correction: {}",
                    utils::format_phase(correction, PhaseUnit::Degrees)
                ),
                Err(e) => println!("Phase offset correction unavailable: {}", e),
            }
        }

        "status" => {
            println!("Status:");
            println!(
                "  File: {}",
                state.current_file.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Samples: {}",
                state.series.as_ref().map_or(0, |s| s.len())
            );
            match &state.result {
                Some(result) => println!(
                    "  Result: {} bins, {} empty, {} sparse",
                    result.len(),
                    result.diagnostics().empty_bins,
                    result.diagnostics().sparse_bins
                ),
                None => println!("  Result: none"),
            }
        }

        "help" => print_help(),

        "quit" | "exit" => {
            println!("Goodbye!");
            std::process::exit(0);
        }

        _ => {
            println!("Unknown command: '{}'", parts[0]);
            println!("Type 'help' for available commands");
        }
    }
}

fn main() {
    // Parse command line arguments
    let matches = Command::new("Phasefold")
        .version(phasefold_lib::VERSION)
        .about("Phase averaging of periodic time series")
        .arg(
            Arg::new("file")
                .help("Column file to load on startup")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("frequency")
                .long("frequency")
                .short('f')
                .help("Repetition frequency")
                .value_name("HZ"),
        )
        .arg(
            Arg::new("bins")
                .long("bins")
                .short('b')
                .help("Number of phase bins")
                .value_name("N"),
        )
        .arg(
            Arg::new("unit")
                .long("unit")
                .short('u')
                .help("Phase unit (degrees, cycles)")
                .value_name("UNIT"),
        )
        .get_matches();

    println!("Phasefold v{}", phasefold_lib::VERSION);
    println!("Type 'help' for available commands\n");

    // Initialize the library
    phasefold_lib::init();

    let mut state = AppState::new();

    // Apply command line configuration
    for (param, key) in [("frequency", "frequency"), ("bins", "bins"), ("unit", "unit")] {
        if let Some(value) = matches.get_one::<String>(key) {
            match apply_setting(&state.config, param, value) {
                Ok(config) => {
                    state.set_config(config);
                    println!("Set {} to {}", param, value);
                }
                Err(e) => eprintln!("Invalid {}: {}", param, e),
            }
        }
    }

    // Load file from command line if provided
    if let Some(filename) = matches.get_one::<String>("file") {
        load_file(&mut state, filename);
    }

    // Setup readline
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create readline: {}", e);
            std::process::exit(1);
        }
    };

    // Main command loop
    loop {
        let readline = rl.readline("phasefold> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    rl.add_history_entry(trimmed).ok();
                    process_command(trimmed, &mut state);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
}
