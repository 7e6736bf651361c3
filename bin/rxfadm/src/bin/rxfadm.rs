// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use slog::info;
use tabwriter::TabWriter;

use rxfadm::pcap;
use rxfadm::pcap::PcapWriter;
use rxfadm::replay::FrameResult;
use rxfadm::replay::RuleCol;
use rxfadm::replay::Sink;
use rxfadm::replay::replay;
use rxfilter::engine::rule::DEFAULT_RULE_COUNT;
use rxfilter::print::print_activity;
use rxfilter::print::print_counters;
use rxfilter::print::print_regs;
use rxfilter::print::print_rules;

/// Administer the rxfilter receive filter
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Replay a capture through the filter and report what it did.
    Run {
        #[command(flatten)]
        filter: FilterArgs,

        /// Capture to replay.
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the frames the filter passes.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Deassert output ready on every Kth cycle.
        #[arg(
            long,
            value_name = "K",
            value_parser = clap::value_parser!(u64).range(2..),
        )]
        stall_every: Option<u64>,
    },

    /// Show the filter's decision for each frame of a capture.
    Classify {
        #[command(flatten)]
        filter: FilterArgs,

        /// Capture to classify.
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Dump the register map of a configured filter.
    Regs {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// TOML rule file.
    #[arg(short, long)]
    config: PathBuf,

    /// Number of rules the filter is built with.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RULE_COUNT)]
    rules: usize,
}

fn print_decision_header(t: &mut impl Write) -> io::Result<()> {
    writeln!(t, "IDX\tLEN\tETHERTYPE\tPROTO\tDECISION\tRULE")
}

fn print_decision(t: &mut impl Write, res: &FrameResult) -> io::Result<()> {
    let decision = match res.decision {
        None => "EMPTY",
        Some(_) if res.passed() => "PASS",
        Some(_) => "DROP",
    };

    let proto = match res.l4_proto {
        Some(6) => "TCP".to_string(),
        Some(17) => "UDP".to_string(),
        Some(p) => p.to_string(),
        None => "-".to_string(),
    };

    writeln!(
        t,
        "{}\t{}\t{}\t{}\t{}\t{}",
        res.index,
        res.len,
        res.ether_type,
        proto,
        decision,
        RuleCol(res.decision),
    )
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = rxfadm::log::init();

    match cmd {
        Command::Run { filter, input, output, stall_every } => {
            let mut pipe =
                rxfadm::load_pipeline(&filter.config, filter.rules, &log)?;
            let frames = pcap::read_file(&input)?;
            let sink = stall_every.map(Sink::StallEvery).unwrap_or_default();
            let out = replay(&mut pipe, &frames, sink)?;
            info!(log, "replay complete";
                "frames" => frames.len(),
                "passed" => out.passed.len(),
                "cycles" => out.cycles);

            if let Some(path) = output {
                let file = BufWriter::new(File::create(&path)?);
                let mut w = PcapWriter::new(file)?;
                for frame in &out.passed {
                    w.add_frame(frame)?;
                }
                w.into_inner()?;
            }

            print_rules(&pipe.dump_rules())?;
            println!();
            print_counters(&pipe.snapshot())?;
            println!();
            print_activity(pipe.activity())?;
        }

        Command::Classify { filter, input } => {
            let mut pipe =
                rxfadm::load_pipeline(&filter.config, filter.rules, &log)?;
            let frames = pcap::read_file(&input)?;
            let out = replay(&mut pipe, &frames, Sink::AlwaysReady)?;

            let mut t = TabWriter::new(io::stdout());
            print_decision_header(&mut t)?;
            for res in &out.results {
                print_decision(&mut t, res)?;
            }
            t.flush()?;
        }

        Command::Regs { filter } => {
            let pipe =
                rxfadm::load_pipeline(&filter.config, filter.rules, &log)?;
            print_regs(&pipe)?;
        }
    }

    Ok(())
}
