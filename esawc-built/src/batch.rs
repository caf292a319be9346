//! Sequential batch run: one Earth Engine query per region, in input order.

use log::{info, warn};
use std::path::Path;

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::collect::ee::ComputeBackend;
use crate::collect::global_variables::{BUILTUP_COLUMN, PROGRESS_EVERY};
use crate::error::{BuiltupError, Result};
use crate::geometric::builtup::BuiltupExtractor;
use crate::geometric::region::Region;
use crate::geometric::vector_dataset::VectorDataset;

#[cfg(feature = "indicatif")]
fn progress_style() -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .ok()
        .map(|style| style.progress_chars("##-"))
}

/// A region that was skipped and written as the missing-value sentinel
#[derive(Debug)]
pub struct RegionFailure {
    /// Row index in the input dataset
    pub index: usize,
    pub error: BuiltupError,
}

/// Per-row built-up areas plus the rows that could not be resolved
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One entry per input row; None is the missing-value sentinel
    pub areas: Vec<Option<f64>>,
    /// Rows written as None, with the reason
    pub failures: Vec<RegionFailure>,
    /// Row indices at which a `Step: i / n` line was printed
    pub progress_steps: Vec<usize>,
}

impl BatchOutcome {
    pub fn resolved(&self) -> usize {
        self.areas.iter().filter(|area| area.is_some()).count()
    }

    /// True when rows were processed and every one came back data-unavailable
    pub fn all_unavailable(&self) -> bool {
        !self.areas.is_empty()
            && self.failures.len() == self.areas.len()
            && self.failures.iter().all(|f| f.error.is_data_unavailable())
    }
}

/// Drives the extractor over every row of a dataset
pub struct BatchDriver<'a, B: ComputeBackend + ?Sized> {
    backend: &'a B,
    extractor: BuiltupExtractor,
    column: String,
    progress_every: usize,
}

impl<'a, B: ComputeBackend + ?Sized> BatchDriver<'a, B> {
    pub fn new(backend: &'a B, extractor: BuiltupExtractor) -> Self {
        BatchDriver {
            backend,
            extractor,
            column: BUILTUP_COLUMN.to_string(),
            progress_every: PROGRESS_EVERY,
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    /// Print a progress line every `every` regions, 0 disables it
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    fn progress_line(&self, count: usize, size: usize) -> Option<String> {
        if self.progress_every > 0 && count % self.progress_every == 0 {
            Some(format!("Step: {} / {}", count, size))
        } else {
            None
        }
    }

    /// Query every row in order
    ///
    /// DataUnavailable and UnsupportedGeometry give None for that row; any
    /// other error aborts the run and is returned.
    pub fn run(&self, dataset: &VectorDataset) -> Result<BatchOutcome> {
        let size = dataset.len();
        let mut outcome = BatchOutcome {
            areas: Vec::with_capacity(size),
            failures: Vec::new(),
            progress_steps: Vec::new(),
        };

        #[cfg(feature = "indicatif")]
        let pb = {
            let pb = ProgressBar::new(size as u64);
            if let Some(style) = progress_style() {
                pb.set_style(style);
            }
            pb.set_message("Regions");
            pb
        };

        for (count, row) in dataset.rows().iter().enumerate() {
            if let Some(line) = self.progress_line(count, size) {
                // Printed even when the bar is hidden (no terminal)
                #[cfg(feature = "indicatif")]
                pb.suspend(|| println!("{}", line));
                #[cfg(not(feature = "indicatif"))]
                println!("{}", line);
                outcome.progress_steps.push(count);
            }

            let result = Region::from_row_geometry(row.geometry.as_ref())
                .and_then(|region| self.extractor.get_builtup(self.backend, &region));

            match result {
                Ok(area) => outcome.areas.push(Some(area)),
                Err(error @ BuiltupError::DataUnavailable(_)) => {
                    info!("Region {}: {}", count, error);
                    outcome.areas.push(None);
                    outcome.failures.push(RegionFailure {
                        index: count,
                        error,
                    });
                }
                Err(error @ BuiltupError::UnsupportedGeometry(_)) => {
                    warn!("Region {}: {}", count, error);
                    outcome.areas.push(None);
                    outcome.failures.push(RegionFailure {
                        index: count,
                        error,
                    });
                }
                Err(error) => {
                    #[cfg(feature = "indicatif")]
                    pb.abandon_with_message(format!("Aborted at region {}", count));
                    return Err(error);
                }
            }

            #[cfg(feature = "indicatif")]
            pb.inc(1);
        }

        #[cfg(feature = "indicatif")]
        pb.finish_with_message("All regions processed");

        info!(
            "{} of {} regions resolved, {} written as null",
            outcome.resolved(),
            size,
            outcome.failures.len()
        );
        if outcome.all_unavailable() {
            warn!(
                "No region returned a built-up value; check the Earth Engine expression and dataset {}",
                self.extractor.dataset_id
            );
        }

        Ok(outcome)
    }

    /// Run and return the dataset with the area column appended
    pub fn augment(&self, dataset: &VectorDataset) -> anyhow::Result<(VectorDataset, BatchOutcome)> {
        let outcome = self.run(dataset)?;
        let mut augmented = dataset.clone();
        augmented.add_column(&self.column, &outcome.areas)?;
        Ok((augmented, outcome))
    }

    /// Run and save to GeoJSON; nothing is written if the run aborts
    pub fn run_to_file(&self, dataset: &VectorDataset, output: &Path) -> anyhow::Result<BatchOutcome> {
        let (augmented, outcome) = self.augment(dataset)?;
        augmented.to_file(output)?;
        Ok(outcome)
    }
}
