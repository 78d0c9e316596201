use eriksen::config::ExperimentConfig;
use eriksen::prng::Prng;
use eriksen::schedule::{balanced_block, Condition};
use eriksen::session::seed_from_clock;
use eriksen::sim::{print_report, run_headless, ObserverProfile};
use std::path::PathBuf;
use std::process;

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("--help" | "-h" | "help")) {
        print_help();
        return;
    }

    if args.is_empty() {
        // Minimal demo: one simulated session of the quick letters variant.
        args = vec!["simulate".to_string(), "--preset".to_string(), "letters".to_string()];
    }

    let cmd = args.remove(0);
    match cmd.as_str() {
        "simulate" => cmd_simulate(args),
        "schedule" => cmd_schedule(args),
        "config" => cmd_config(args),
        _ => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            process::exit(2);
        }
    }
}

fn print_help() {
    println!("eriksen (flanker experiment engine)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- simulate [--preset battery|letters|bounded|prompted] [--config file.json]");
    println!("                        [--seed N] [--participant ID] [--accuracy F] [--out file.csv]");
    println!("  cargo run -- schedule <n> [--seed N]");
    println!("  cargo run -- config <path> [--preset battery|letters|bounded|prompted]");
    println!("  cargo run -- --help");
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

/// Pull `--name value` out of the argument list, if present.
fn take_flag(args: &mut Vec<String>, name: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == name)?;
    if idx + 1 >= args.len() {
        fail(&format!("{name} needs a value"));
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Some(value)
}

fn load_config(args: &mut Vec<String>) -> ExperimentConfig {
    if let Some(path) = take_flag(args, "--config") {
        match ExperimentConfig::load(&PathBuf::from(&path)) {
            Ok(config) => return config,
            Err(e) => fail(&format!("{path}: {e}")),
        }
    }
    let preset = take_flag(args, "--preset").unwrap_or_else(|| "battery".to_string());
    match ExperimentConfig::preset(&preset) {
        Some(config) => config,
        None => fail(&format!(
            "unknown preset `{preset}` (have: {})",
            ExperimentConfig::PRESET_NAMES.join(", ")
        )),
    }
}

fn cmd_simulate(mut args: Vec<String>) {
    let config = load_config(&mut args);
    let participant = take_flag(&mut args, "--participant").unwrap_or_else(|| "sim".to_string());
    let seed = match take_flag(&mut args, "--seed") {
        Some(s) => s
            .parse::<u64>()
            .unwrap_or_else(|_| fail("--seed must be an unsigned integer")),
        None => config.seed.unwrap_or_else(seed_from_clock),
    };
    let out = take_flag(&mut args, "--out").map(PathBuf::from);

    let mut profile = ObserverProfile::default();
    if let Some(acc) = take_flag(&mut args, "--accuracy") {
        let acc: f32 = acc
            .parse()
            .unwrap_or_else(|_| fail("--accuracy must be a number in [0, 1]"));
        if !(0.0..=1.0).contains(&acc) {
            fail("--accuracy must be a number in [0, 1]");
        }
        profile.accuracy = acc;
    }
    if let Some(extra) = args.first() {
        fail(&format!("unexpected argument: {extra}"));
    }

    match run_headless(config, &participant, seed, &profile, out.as_deref()) {
        Ok(report) => {
            print_report(&report);
            if let Some(path) = out {
                println!("results={}", path.display());
            }
        }
        Err(e) => fail(&format!("simulation failed: {e}")),
    }
}

fn cmd_schedule(mut args: Vec<String>) {
    let seed = match take_flag(&mut args, "--seed") {
        Some(s) => s
            .parse::<u64>()
            .unwrap_or_else(|_| fail("--seed must be an unsigned integer")),
        None => seed_from_clock(),
    };
    let n: usize = args
        .first()
        .unwrap_or_else(|| fail("schedule needs a block size"))
        .parse()
        .unwrap_or_else(|_| fail("block size must be an unsigned integer"));

    let mut prng = Prng::new(seed);
    let block = balanced_block(n, &mut prng);

    println!("seed={seed}");
    for (i, condition) in block.iter().enumerate() {
        println!("{i:3} {}", condition.label());
    }
    let mut counts = [0usize; 3];
    for condition in &block {
        counts[condition.index()] += 1;
    }
    for condition in Condition::ALL {
        println!("count[{}]={}", condition.label(), counts[condition.index()]);
    }
}

fn cmd_config(mut args: Vec<String>) {
    let preset = take_flag(&mut args, "--preset").unwrap_or_else(|| "battery".to_string());
    let path = match args.first() {
        Some(path) => PathBuf::from(path),
        None => fail("config needs an output path"),
    };
    let config = match ExperimentConfig::preset(&preset) {
        Some(config) => config,
        None => fail(&format!(
            "unknown preset `{preset}` (have: {})",
            ExperimentConfig::PRESET_NAMES.join(", ")
        )),
    };
    match config.save(&path) {
        Ok(()) => println!("wrote {}", path.display()),
        Err(e) => fail(&format!("{}: {e}", path.display())),
    }
}
