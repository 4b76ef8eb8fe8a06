// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use abstr_int::{AnalysisError, AnalysisProducts, FunctionResult};
use lifted_il::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatisticID {
    /// Time it takes to analyse a single root function.
    RootTime,
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    /// Measured durations per statistic.
    stats: HashMap<StatisticID, Vec<Duration>>,
    /// Maximal number of blocks with a state in a single root result.
    max_blocks: usize,
}

impl RuntimeStats {
    pub fn new() -> RuntimeStats {
        RuntimeStats::default()
    }

    /// Add a data point.
    pub fn add_dp(&mut self, set_id: StatisticID, dp: Duration) {
        self.stats.entry(set_id).or_default().push(dp);
    }

    /// Returns the average duration of the requested statistic.
    pub fn get_avg_duration(&self, stat_id: StatisticID) -> Option<Duration> {
        let set = self.stats.get(&stat_id)?;
        if set.is_empty() {
            return None;
        }
        let sum: Duration = set.iter().sum();
        Some(sum / set.len() as u32)
    }

    pub fn get_num_dps(&self, stat_id: StatisticID) -> usize {
        self.stats.get(&stat_id).map_or(0, |s| s.len())
    }

    pub fn add_block_count(&mut self, n: usize) {
        if self.max_blocks < n {
            self.max_blocks = n;
        }
    }

    pub fn get_max_blocks(&self) -> usize {
        self.max_blocks
    }
}

/// Collected state of a running analysis.
pub struct RunState {
    /// Timestamp when the analysis started.
    pub run_start: Instant,
    /// Result of every analysed root.
    pub results: BTreeMap<Address, Result<FunctionResult, AnalysisError>>,
    /// Products of all successful results.
    pub products: AnalysisProducts,
    pub runtime_stats: RuntimeStats,
}

impl RunState {
    pub fn new() -> RunState {
        RunState {
            run_start: Instant::now(),
            results: BTreeMap::new(),
            products: AnalysisProducts::new(),
            runtime_stats: RuntimeStats::new(),
        }
    }

    /// Adds the result of analysing the root [func] which took [duration].
    pub fn update(
        &mut self,
        func: Address,
        result: Result<FunctionResult, AnalysisError>,
        duration: Duration,
    ) {
        self.runtime_stats.add_dp(StatisticID::RootTime, duration);
        if let Ok(r) = result.as_ref() {
            self.products.merge(&r.products);
            self.runtime_stats.add_block_count(r.block_states.len());
        }
        self.results.insert(func, result);
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::new()
    }
}
