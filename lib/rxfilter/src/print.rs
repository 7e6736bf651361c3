// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print engine state in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both rxfadm and integration tests.

use crate::api::CounterSnapshot;
use crate::api::DumpRulesResp;
use crate::engine::pipeline::Pipeline;
use crate::engine::stat::ActivityStats;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`DumpRulesResp`].
pub fn print_rules(resp: &DumpRulesResp) -> std::io::Result<()> {
    print_rules_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpRulesResp`] into a given writer.
pub fn print_rules_into(
    writer: &mut impl Write,
    resp: &DumpRulesResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Rules {}", resp.name)?;
    write_hrb(&mut t)?;
    writeln!(t, "IDX\tHITS\tMATCH")?;
    for rd in &resp.rules {
        writeln!(t, "{}\t{}\t{}", rd.idx, rd.hits, rd.rule)?;
    }
    t.flush()
}

/// Print a [`CounterSnapshot`].
pub fn print_counters(snap: &CounterSnapshot) -> std::io::Result<()> {
    print_counters_into(&mut std::io::stdout(), snap)
}

/// Print a [`CounterSnapshot`] into a given writer.
pub fn print_counters_into(
    writer: &mut impl Write,
    snap: &CounterSnapshot,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "COUNTER\tVALUE")?;
    write_hr(&mut t)?;
    writeln!(t, "total_packets\t{}", snap.total_packets)?;
    writeln!(t, "dropped_packets\t{}", snap.dropped_packets)?;
    for (i, hits) in snap.rule_hits.iter().enumerate() {
        writeln!(t, "rule{i}_hit_count\t{hits}")?;
    }
    t.flush()
}

/// Print [`ActivityStats`].
pub fn print_activity(stats: &ActivityStats) -> std::io::Result<()> {
    print_activity_into(&mut std::io::stdout(), stats)
}

/// Print [`ActivityStats`] into a given writer.
pub fn print_activity_into(
    writer: &mut impl Write,
    stats: &ActivityStats,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "CYCLES\tIN\tOUT\tDROPPED\tIN STALL\tOUT STALL\tEFFICIENCY")?;
    writeln!(
        t,
        "{}\t{}\t{}\t{}\t{}\t{}\t{:.1}%",
        stats.cycles,
        stats.beats_in,
        stats.beats_out,
        stats.beats_dropped,
        stats.in_stalls,
        stats.out_stalls,
        stats.efficiency_pct(),
    )?;
    t.flush()
}

/// Print the register map of a [`Pipeline`] along with each
/// register's current value.
pub fn print_regs(pipe: &Pipeline) -> std::io::Result<()> {
    print_regs_into(&mut std::io::stdout(), pipe)
}

/// Print the register map of a [`Pipeline`] into a given writer.
pub fn print_regs_into(
    writer: &mut impl Write,
    pipe: &Pipeline,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "ADDR\tREGISTER\tACCESS\tVALUE")?;
    write_hr(&mut t)?;
    for (addr, reg) in pipe.register_map().iter() {
        let access = if reg.is_writable() { "rw" } else { "ro" };
        writeln!(
            t,
            "{addr:#06x}\t{reg}\t{access}\t{:#010x}",
            pipe.reg_read(addr)
        )?;
    }
    t.flush()
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
