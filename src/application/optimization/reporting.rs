//! Reporting utilities for hybrid optimization passes.
//!
//! Provides formatted console output and JSON export for the `optimize` CLI.

use crate::application::optimization::engine::PassReport;
use crate::domain::optimization::{OptimizationCheckpoint, ParameterBounds};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Exported document: one entry per algorithm that produced a solution
#[derive(Debug, Serialize)]
pub struct PassExport<'a> {
    pub pass_id: String,
    pub duration_seconds: f64,
    pub checkpoints: Vec<&'a OptimizationCheckpoint>,
    pub named_parameters: Vec<Vec<(String, f64)>>,
}

impl<'a> PassExport<'a> {
    pub fn new(report: &'a PassReport, bounds: &ParameterBounds) -> Self {
        let checkpoints: Vec<&OptimizationCheckpoint> = report.checkpoints().collect();
        let named_parameters = checkpoints
            .iter()
            .map(|c| bounds.describe(&c.solution_vector))
            .collect();
        Self {
            pass_id: report.pass_id.to_string(),
            duration_seconds: report.duration.as_secs_f64(),
            checkpoints,
            named_parameters,
        }
    }
}

/// Reporter for hybrid pass output
pub struct PassReporter {
    output_dir: String,
}

impl PassReporter {
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }

    /// Prints the header banner for the run
    pub fn print_header(&self, data_source: &str, output: &str) {
        println!("{}", "=".repeat(80));
        println!("HYBRID PSO/GA PARAMETER OPTIMIZER");
        println!("{}", "=".repeat(80));
        println!("Data:         {}", data_source);
        println!("Output:       {}", output);
        println!("{}", "=".repeat(80));
    }

    /// Prints the search space
    pub fn print_bounds(&self, bounds: &ParameterBounds) {
        println!("\nSearch space ({} dimensions):", bounds.dimension());
        for bound in bounds.iter() {
            println!("  {:<18} [{:>8.3}, {:>8.3}]", bound.name, bound.min, bound.max);
        }
    }

    /// Prints each algorithm's best solution side by side
    pub fn print_pass_report(&self, report: &PassReport, bounds: &ParameterBounds) {
        println!("\n{}", "=".repeat(80));
        println!(
            "PASS {} COMPLETE in {:.2}s",
            report.pass_id,
            report.duration.as_secs_f64()
        );
        println!("{}", "=".repeat(80));

        let pso = report.particle_swarm.as_ref();
        let ga = report.genetic.as_ref();
        println!("{:<18} | {:>14} | {:>14}", "Parameter", "PSO", "GA");
        println!("{}", "-".repeat(52));
        for (i, bound) in bounds.iter().enumerate() {
            println!(
                "{:<18} | {:>14} | {:>14}",
                bound.name,
                format_component(pso, i),
                format_component(ga, i)
            );
        }
        println!("{}", "-".repeat(52));
        println!(
            "{:<18} | {:>14} | {:>14}",
            "Score",
            pso.map(|c| format!("{:.4}", c.fitness))
                .unwrap_or_else(|| "failed".to_string()),
            ga.map(|c| format!("{:.4}", c.fitness))
                .unwrap_or_else(|| "failed".to_string())
        );
        println!("{}\n", "=".repeat(80));
    }

    /// Exports the pass to a JSON file, returning the written path
    pub fn export_json(
        &self,
        report: &PassReport,
        bounds: &ParameterBounds,
        filename: &str,
    ) -> Result<String> {
        let output_path = if filename.contains('/') || filename.contains('\\') {
            filename.to_string()
        } else {
            format!("{}/{}", self.output_dir, filename)
        };

        if let Some(parent) = Path::new(&output_path).parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let json_output = serde_json::to_string_pretty(&PassExport::new(report, bounds))
            .context("Failed to serialize pass to JSON")?;
        std::fs::write(&output_path, json_output)
            .context(format!("Failed to write results to {}", output_path))?;

        println!("Results saved to: {}", output_path);
        Ok(output_path)
    }
}

impl Default for PassReporter {
    fn default() -> Self {
        Self::new(".")
    }
}

fn format_component(checkpoint: Option<&OptimizationCheckpoint>, index: usize) -> String {
    checkpoint
        .and_then(|c| c.solution_vector.get(index))
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::AlgorithmTag;
    use std::time::Duration;
    use uuid::Uuid;

    fn report() -> PassReport {
        PassReport {
            pass_id: Uuid::new_v4(),
            particle_swarm: Some(OptimizationCheckpoint::new(
                AlgorithmTag::ParticleSwarm,
                vec![1.0, 2.0],
                -0.5,
            )),
            genetic: None,
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_export_includes_named_parameters() {
        let bounds = ParameterBounds::from_ranges(&[(0.0, 5.0), (0.0, 5.0)]).unwrap();
        let report = report();
        let export = PassExport::new(&report, &bounds);
        assert_eq!(export.checkpoints.len(), 1);
        assert_eq!(
            export.named_parameters[0],
            vec![("x0".to_string(), 1.0), ("x1".to_string(), 2.0)]
        );
        assert_eq!(export.duration_seconds, 1.5);
    }

    #[test]
    fn test_export_json_writes_file() {
        let dir = std::env::temp_dir().join(format!("rustune_test_{}_report", std::process::id()));
        let bounds = ParameterBounds::from_ranges(&[(0.0, 5.0), (0.0, 5.0)]).unwrap();
        let reporter = PassReporter::new(dir.to_str().unwrap());

        let path = reporter.export_json(&report(), &bounds, "pass.json").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"PSO\""));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_format_component_handles_missing() {
        assert_eq!(format_component(None, 0), "-");
        let checkpoint = OptimizationCheckpoint::new(AlgorithmTag::Genetic, vec![3.25], 1.0);
        assert_eq!(format_component(Some(&checkpoint), 0), "3.2500");
        assert_eq!(format_component(Some(&checkpoint), 4), "-");
    }
}
