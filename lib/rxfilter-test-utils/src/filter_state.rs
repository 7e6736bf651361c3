// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routines for verifying filter counter state.

use rxfilter::engine::Pipeline;
use std::collections::BTreeMap;

/// Track the expected counters of a pipeline for the purpose of
/// verifying that certain events occur when traffic crosses it. This
/// type should be manipulated by the macros that follow.
///
/// # Counts
///
/// Each entry in the `counts` map is keyed by the register name of a
/// counter: `total_packets`, `dropped_packets`, or
/// `rule<N>_hit_count`. When the filter state is asserted we make
/// sure the pipeline's counters match these values.
pub struct FilterState {
    pub counts: BTreeMap<String, u32>,
}

impl FilterState {
    pub fn new(rule_count: usize) -> Self {
        let mut counts = BTreeMap::new();
        counts.insert("total_packets".to_string(), 0);
        counts.insert("dropped_packets".to_string(), 0);
        for i in 0..rule_count {
            counts.insert(format!("rule{i}_hit_count"), 0);
        }

        Self { counts }
    }
}

/// A pipeline and the state we expect it to be in.
pub struct PipeAndState {
    pub pipe: Pipeline,
    pub fs: FilterState,
}

impl PipeAndState {
    pub fn new(pipe: Pipeline) -> Self {
        let fs = FilterState::new(pipe.rule_count());
        Self { pipe, fs }
    }
}

/// Assert that the pipeline's counters match the expected state
/// stored in the `FilterState`.
#[macro_export]
macro_rules! assert_filter {
    ($pas:expr) => {
        for (field, expected_val) in $pas.fs.counts.iter() {
            let id: $crate::CounterId = match field.parse() {
                Ok(id) => id,
                Err(e) => panic!("bad field: {}", e),
            };
            let actual_val = $pas.pipe.read_counter(id);
            assert!(
                *expected_val == actual_val,
                "field value mismatch: field: {}, expected: {}, actual: {}",
                field,
                expected_val,
                actual_val,
            );
        }
    };
}

/// Increment a field in the `FilterState.counts` map.
#[macro_export]
macro_rules! incr_field {
    ($fs:expr, $field:expr) => {
        match $fs.counts.get_mut($field) {
            Some(v) => *v = v.wrapping_add(1),
            None => panic!("field does not exist: {}", $field),
        }
    };
}

/// Increment a list of fields in the `FilterState.counts` map.
#[macro_export]
macro_rules! incr_na {
    ($pas:expr, $fields:expr) => {
        for f in $fields {
            $crate::incr_field!($pas.fs, f);
        }
    };
}

/// Increment a list of fields in the `FilterState.counts` map and
/// assert the filter state.
#[macro_export]
macro_rules! incr {
    ($pas:expr, $fields:expr) => {
        $crate::incr_na!($pas, $fields);
        $crate::assert_filter!($pas);
    };
}

/// Set the value of a field in the `FilterState.counts` map.
#[macro_export]
macro_rules! set_field {
    ($pas:expr, $field:expr, $val:expr) => {
        match $pas.fs.counts.get_mut($field) {
            Some(v) => *v = $val,
            None => panic!("field does not exist: {}", $field),
        }
    };
}

/// Set multiple fields at once.
///
/// ```ignore
/// set_fields!(pas, ["total_packets=0", "rule1_hit_count=7"]);
/// ```
#[macro_export]
macro_rules! set_fields {
    ($pas:expr, $fields:expr) => {
        for f in $fields {
            match f.split_once("=") {
                Some((field, val)) => {
                    $crate::set_field!($pas, field, val.parse().unwrap());
                }

                _ => panic!("malformed field expr: {}", f),
            }
        }
    };
}

/// Zero every field, as a reset does.
#[macro_export]
macro_rules! zero_fields {
    ($pas:expr) => {
        for v in $pas.fs.counts.values_mut() {
            *v = 0;
        }
    };
}
