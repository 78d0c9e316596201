//! CLI for inspecting results files written by the experiment frontends.
//!
//! Examples:
//!   eriksen-cli report results/jane_1766000000.csv
//!   eriksen-cli schema
//!   eriksen-cli paths

use eriksen::paths;
use eriksen::results::{ResultsLog, CSV_HEADER};
use eriksen::schedule::Condition;
use eriksen::stats::{summarize, BlockStats};
use std::path::Path;
use std::process;

fn usage() -> ! {
    eprintln!("eriksen-cli (results file tools)");
    eprintln!("Usage: eriksen-cli <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  report <file.csv>   Per-module accuracy, reaction times and flanker effect");
    eprintln!("  schema              Print the results file contract");
    eprintln!("  paths               Show the default results directory");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    match args[0].as_str() {
        "report" => {
            if args.len() < 2 {
                usage();
            }
            report(Path::new(&args[1]));
        }
        "schema" => schema(),
        "paths" => paths(),
        _ => usage(),
    }
}

fn report(path: &Path) {
    let log = match ResultsLog::read_csv(path) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    };

    let meta = &log.meta;
    print!("participant={}", meta.participant);
    if let Some(age) = meta.age {
        print!(" age={age}");
    }
    if let Some(seed) = meta.seed {
        print!(" seed={seed}");
    }
    if let Some(t) = meta.started_unix {
        print!(" started_unix={t}");
    }
    println!();

    let summary = summarize(log.records());
    let checks_shown: u32 = summary.modules.iter().map(|m| m.checks_shown).sum();
    let checks_hit: u32 = summary.modules.iter().map(|m| m.checks_hit).sum();
    println!(
        "rows={} trials={} checks={}/{} accuracy={:.1}% mean_rt={}",
        log.len(),
        summary.overall.trials,
        checks_hit,
        checks_shown,
        summary.overall.accuracy() * 100.0,
        fmt_rt(summary.overall.mean_reaction_seconds()),
    );

    for module in &summary.modules {
        println!(
            "module={} trials={} checks={}/{}",
            module.name, module.overall.trials, module.checks_hit, module.checks_shown,
        );
        for condition in Condition::ALL {
            print_condition_line(condition.label(), module.condition(condition));
        }
        match module.flanker_effect_seconds() {
            Some(effect) => println!("  flanker_effect={effect:+.4}s"),
            None => println!("  flanker_effect=n/a"),
        }
    }
}

fn print_condition_line(label: &str, stats: &BlockStats) {
    println!(
        "  {:<12} n={:<3} acc={:>5.1}% rt={}",
        label,
        stats.trials,
        stats.accuracy() * 100.0,
        fmt_rt(stats.mean_reaction_seconds()),
    );
}

fn fmt_rt(rt: Option<f64>) -> String {
    match rt {
        Some(rt) => format!("{rt:.4}s"),
        None => "n/a".to_string(),
    }
}

fn schema() {
    println!("header: {CSV_HEADER}");
    println!("leading comments: # key=value (participant, age, seed, started_unix)");
    println!("condition: congruent | incongruent | neutral (empty on attention rows)");
    println!("response: left | right | clicked | none");
    println!("reaction time: seconds, four decimals, empty when no response was captured");
    println!("attention rows: TargetOrCheck=ATTENTION, condition and flanker empty");
}

// Same resolution the frontend writes with, so the two always agree.
fn paths() {
    let dir = paths::results_dir();
    println!("Results directory: {}", dir.display());
    println!(
        "Session files: {}",
        dir.join("<participant>_<started_unix>.csv").display()
    );
}
