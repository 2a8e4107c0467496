// ============================================================================
// report.rs — wator
// Run recording: per-generation population records, CSV export, and a JSON
// summary stamped with a run id.
// ============================================================================

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use wator::{AgeBucket, Population, Simulation, WatorConfig};

// ======================== Generation Record ========================

#[derive(Clone, Debug, Serialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub time_ms: f64,
    pub step_ms: f64,
    pub prey: usize,
    pub predators: usize,
    pub empty: usize,
    pub mean_predator_energy: f64,
}

impl GenerationRecord {
    pub fn csv_header() -> &'static str {
        "generation,time_ms,step_ms,prey,predators,empty,mean_predator_energy"
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{:.1},{:.3},{},{},{},{:.3}",
            self.generation,
            self.time_ms,
            self.step_ms,
            self.prey,
            self.predators,
            self.empty,
            self.mean_predator_energy,
        )
    }
}

// ======================== Run Report ========================

#[derive(Clone, Debug, Serialize)]
pub struct RunReport<'a> {
    pub run_id: &'a str,
    pub start_time: &'a str,
    pub app_version: &'static str,
    pub config: &'a WatorConfig,
    pub seed: u64,
    pub workers: usize,
    pub generations: u32,
    pub extinct: bool,
    pub wall_time_ms: f64,
    pub final_population: Population,
    pub final_ages: Vec<(u32, AgeBucket)>,
    pub records: &'a [GenerationRecord],
}

// ======================== Recorder ========================

pub struct RunRecorder {
    pub run_id: String,
    pub run_start: Instant,
    pub run_start_time: String,
    pub records: Vec<GenerationRecord>,
}

impl Default for RunRecorder {
    fn default() -> Self {
        let now = Local::now();
        Self {
            run_id: format!("run_{}", now.format("%Y%m%d_%H%M%S")),
            run_start: Instant::now(),
            run_start_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            records: Vec::with_capacity(1_024),
        }
    }
}

impl RunRecorder {
    /// Record the simulation's published statistics after a step.
    pub fn record(&mut self, sim: &Simulation) {
        let population = sim.population();
        self.records.push(GenerationRecord {
            generation: sim.generation(),
            time_ms: self.run_start.elapsed().as_secs_f64() * 1000.0,
            step_ms: sim
                .last_step_time()
                .map_or(0.0, |d| d.as_secs_f64() * 1000.0),
            prey: population.prey,
            predators: population.predators,
            empty: population.empty,
            mean_predator_energy: sim.stats().mean_predator_energy(),
        });
    }

    /// Write every record as CSV.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", GenerationRecord::csv_header())?;
        for record in &self.records {
            writeln!(out, "{}", record.to_csv_line())?;
        }
        out.flush()?;
        log::info!("Exported {} generation records to {:?}", self.records.len(), path);
        Ok(())
    }

    /// Build the JSON summary for the finished run.
    pub fn report<'a>(&'a self, sim: &'a Simulation) -> RunReport<'a> {
        RunReport {
            run_id: &self.run_id,
            start_time: &self.run_start_time,
            app_version: env!("CARGO_PKG_VERSION"),
            config: sim.config(),
            seed: sim.seed(),
            workers: sim.workers(),
            generations: sim.generation(),
            extinct: !sim.is_active(),
            wall_time_ms: self.run_start.elapsed().as_secs_f64() * 1000.0,
            final_population: sim.population(),
            final_ages: sim.age_histogram().iter().collect(),
            records: &self.records,
        }
    }

    pub fn export_json(&self, sim: &Simulation, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report(sim))
            .context("failed to serialize run report")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Exported run report {} to {:?}", self.run_id, path);
        Ok(())
    }
}
