// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main.rs
//
// This file contains the main entry point for the cache simulator.
// It reads the trace file named on the command line, takes the hierarchy
// configuration interactively on stdin, runs every replacement policy
// through the warm-up/measure protocol, and prints per-level statistics
// plus miss-rate, cycle, and AMAT rank lists.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use cachesim_rust::errors::SimulatorError;
use cachesim_rust::memory_hierarchy::config::ReplacementPolicy;
use cachesim_rust::memory_hierarchy::simulator::{LevelSpec, PolicyOutcome, TraceExperiment};
use cachesim_rust::utils::parser::load_trace;

#[derive(Parser)]
#[command(name = "cachesim_rust")]
#[command(about = "A trace-driven multi-level cache hierarchy simulator written in Rust")]
#[command(version)]
struct Cli {
    /// Input trace file: one 'r'/'w' plus hex address per line
    trace: PathBuf,

    /// Log level (error, warn, info, debug)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Write a JSON summary of every policy outcome to this path
    #[arg(short, long)]
    report: Option<PathBuf>,
}

// Whitespace-separated numbers from stdin, independent of line breaks.
struct TokenStream {
    tokens: VecDeque<String>,
}

impl TokenStream {
    fn new() -> Self {
        Self {
            tokens: VecDeque::new(),
        }
    }

    fn next_usize(&mut self) -> Result<usize, Box<dyn Error>> {
        loop {
            if let Some(token) = self.tokens.pop_front() {
                return Ok(token.parse()?);
            }
            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                return Err("unexpected end of configuration input".into());
            }
            self.tokens
                .extend(line.split_whitespace().map(String::from));
        }
    }
}

fn read_level_specs() -> Result<Vec<LevelSpec>, Box<dyn Error>> {
    let mut tokens = TokenStream::new();

    print!("Set Cache level: ");
    io::stdout().flush()?;
    let level_count = tokens.next_usize()?;
    if !(1..=3).contains(&level_count) {
        return Err(Box::new(SimulatorError::InvalidCacheLevels(level_count)));
    }

    println!("Set Cache info for {} levels:", level_count);
    let mut specs = Vec::with_capacity(level_count);
    for _ in 0..level_count {
        println!("Size(KB) | Associativity | block_size | write_mode");
        let size_kb = tokens.next_usize()?;
        let associativity = tokens.next_usize()?;
        let block_size = tokens.next_usize()?;
        let write_mode = tokens.next_usize()?;
        specs.push(LevelSpec {
            size_kb,
            associativity,
            block_size,
            write_through: write_mode == 1,
        });
    }

    Ok(specs)
}

fn print_outcome(outcome: &PolicyOutcome) {
    for (index, stats) in outcome.levels.iter().enumerate() {
        println!("Level {} Cache info:", index + 1);
        print!("{}", stats.summary());
    }
    println!("Memory info:");
    print!("{}", outcome.memory.summary());
    println!("Total Cycles:   {}", outcome.total_cycles);
    println!("AMAT:           {:.7}", outcome.amat);
    println!();
}

fn print_rank_lists(outcomes: &[PolicyOutcome], level_count: usize) {
    for level in 0..level_count {
        let mut ranked: Vec<(f64, &str)> = outcomes
            .iter()
            .map(|outcome| (outcome.miss_rates[level], outcome.policy.as_str()))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        println!("{}", format!("Cache Level {} Ranklist:", level + 1).cyan());
        for (rank, (miss_rate, name)) in ranked.iter().enumerate() {
            println!(
                "\t| Rank: {:2}\t| miss rate: {:7.3}%\t| With replace method: {:>6}",
                rank + 1,
                miss_rate * 100.0,
                name
            );
        }
    }

    let mut by_cycles: Vec<(u64, &str)> = outcomes
        .iter()
        .map(|outcome| (outcome.total_cycles, outcome.policy.as_str()))
        .collect();
    by_cycles.sort_by_key(|entry| entry.0);

    println!("{}", "Access time Ranklist:".cyan());
    for (rank, (cycles, name)) in by_cycles.iter().enumerate() {
        println!(
            "\t| Rank: {:2}\t| access cycles: {:9}\t| With replace method: {:>6}",
            rank + 1,
            cycles,
            name
        );
    }

    let mut by_amat: Vec<(f64, &str)> = outcomes
        .iter()
        .map(|outcome| (outcome.amat, outcome.policy.as_str()))
        .collect();
    by_amat.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    println!("{}", "AMAT Ranklist:".cyan());
    for (rank, (amat, name)) in by_amat.iter().enumerate() {
        println!(
            "\t| Rank: {:2}\t| AMAT: {:11.3}\t| With replace method: {:>6}",
            rank + 1,
            amat,
            name
        );
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    println!("Cache Simulator started.");

    let trace = load_trace(&cli.trace)?;
    println!("trace_tot = {}", trace.len());

    let specs = read_level_specs()?;
    let experiment = TraceExperiment::new(&specs, trace)?;

    let mut outcomes = Vec::new();
    for policy in ReplacementPolicy::ALL {
        println!("Executing...");
        println!(
            "{}",
            format!("Using replace policy: {}", policy.name()).green()
        );
        let outcome = experiment.run_policy(policy);
        print_outcome(&outcome);
        outcomes.push(outcome);
    }

    print_rank_lists(&outcomes, specs.len());

    if let Some(path) = &cli.report {
        fs::write(path, serde_json::to_string_pretty(&outcomes)?)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    if let Err(error) = run(&cli) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
