//! Maps a results payload onto chart and table ready series.

use bench_common::RunResults;
use serde::Serialize;
use tracing::{debug, warn};

/// Which metric a plot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Throughput,
    Latency,
}

impl PlotKind {
    pub fn title(&self) -> &'static str {
        match self {
            PlotKind::Throughput => "QPS comparison",
            PlotKind::Latency => "Mean response time comparison",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            PlotKind::Throughput => "req/s",
            PlotKind::Latency => "s",
        }
    }
}

/// One labeled line on a plot.
///
/// `points[i]` belongs to the plot's `x_labels[i]`; a missing value is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<Option<f64>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest value present, if any.
    pub fn max(&self) -> Option<f64> {
        self.points.iter().flatten().copied().reduce(f64::max)
    }
}

/// A rendered plot: concurrency levels on the x axis, one series per service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plot {
    pub kind: PlotKind,
    /// Generation of the presentation this plot belongs to
    pub generation: u64,
    pub x_labels: Vec<u32>,
    pub series: Vec<Series>,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub service: String,
    pub concurrent_users: u32,
    pub qps: Option<f64>,
    pub response_time: Option<f64>,
}

/// Slot that owns at most one live plot.
#[derive(Debug, Default)]
pub struct PlotSlot {
    current: Option<Plot>,
    released: u64,
}

impl PlotSlot {
    /// Release the current plot, if any, then install `plot`.
    pub fn replace(&mut self, plot: Plot) -> &Plot {
        if let Some(old) = self.current.take() {
            self.released += 1;
            debug!(kind = ?old.kind, generation = old.generation, "Released plot");
        }
        self.current.insert(plot)
    }

    pub fn current(&self) -> Option<&Plot> {
        self.current.as_ref()
    }

    /// How many plots this slot has released so far.
    pub fn released(&self) -> u64 {
        self.released
    }

    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            self.released += 1;
        }
    }
}

/// Everything the presentation layer needs for one set of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub generation: u64,
    pub throughput: Plot,
    pub latency: Plot,
    pub table: Vec<TableRow>,
}

/// Builds plots and table rows from a results payload.
#[derive(Debug, Default)]
pub struct ResultsPresenter {
    generation: u64,
    throughput: PlotSlot,
    latency: PlotSlot,
    last: Option<Presentation>,
}

impl ResultsPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `results`, replacing whatever was shown before.
    ///
    /// Series shorter than `concurrent_users` are padded with `None`, longer
    /// ones truncated, so every series lines up with the x axis.
    pub fn present(&mut self, results: &RunResults) -> &Presentation {
        self.generation += 1;
        let generation = self.generation;

        let misaligned = results.misaligned_services();
        if !misaligned.is_empty() {
            warn!(services = ?misaligned, "Results series do not match concurrency levels");
        }

        let x_labels = results.concurrent_users.clone();
        let throughput = Plot {
            kind: PlotKind::Throughput,
            generation,
            x_labels: x_labels.clone(),
            series: results
                .services
                .iter()
                .enumerate()
                .map(|(i, s)| aligned_series(s.label(i), &s.qps, x_labels.len()))
                .collect(),
        };
        let latency = Plot {
            kind: PlotKind::Latency,
            generation,
            x_labels: x_labels.clone(),
            series: results
                .services
                .iter()
                .enumerate()
                .map(|(i, s)| aligned_series(s.label(i), &s.response_times, x_labels.len()))
                .collect(),
        };

        let table = results
            .services
            .iter()
            .enumerate()
            .flat_map(|(index, service)| {
                let label = service.label(index);
                x_labels.iter().enumerate().map(move |(i, &users)| TableRow {
                    service: label.clone(),
                    concurrent_users: users,
                    qps: service.qps.get(i).copied(),
                    response_time: service.response_times.get(i).copied(),
                })
            })
            .collect();

        let presentation = Presentation {
            generation,
            throughput: self.throughput.replace(throughput).clone(),
            latency: self.latency.replace(latency).clone(),
            table,
        };

        debug!(
            generation,
            services = results.services.len(),
            points = x_labels.len(),
            "Presented results"
        );
        self.last.insert(presentation)
    }

    /// The most recent presentation.
    pub fn current(&self) -> Option<&Presentation> {
        self.last.as_ref()
    }

    pub fn throughput_slot(&self) -> &PlotSlot {
        &self.throughput
    }

    pub fn latency_slot(&self) -> &PlotSlot {
        &self.latency
    }

    /// Drop everything currently shown.
    pub fn clear(&mut self) {
        self.throughput.clear();
        self.latency.clear();
        self.last = None;
    }
}

fn aligned_series(label: String, values: &[f64], len: usize) -> Series {
    Series {
        label,
        points: (0..len).map(|i| values.get(i).copied()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_common::ServiceResults;

    fn single_service() -> RunResults {
        RunResults {
            concurrent_users: vec![1, 5, 10],
            services: vec![ServiceResults {
                name: "search".to_string(),
                qps: vec![10.0, 40.0, 55.0],
                response_times: vec![0.2, 0.3, 0.5],
            }],
        }
    }

    #[test]
    fn test_one_series_per_plot_index_aligned() {
        let mut presenter = ResultsPresenter::new();
        let view = presenter.present(&single_service());

        assert_eq!(view.throughput.x_labels, vec![1, 5, 10]);
        assert_eq!(view.throughput.series.len(), 1);
        assert_eq!(view.latency.series.len(), 1);
        assert_eq!(view.throughput.series[0].label, "search");
        assert_eq!(
            view.throughput.series[0].points,
            vec![Some(10.0), Some(40.0), Some(55.0)]
        );
        assert_eq!(
            view.latency.series[0].points,
            vec![Some(0.2), Some(0.3), Some(0.5)]
        );
        assert_eq!(view.table.len(), 3);
        assert_eq!(view.table[2].concurrent_users, 10);
        assert_eq!(view.table[2].qps, Some(55.0));
    }

    #[test]
    fn test_partial_series_are_padded() {
        let results = RunResults {
            concurrent_users: vec![1, 5, 10],
            services: vec![
                ServiceResults {
                    name: "a".to_string(),
                    qps: vec![1.0],
                    response_times: vec![],
                },
                ServiceResults {
                    name: "b".to_string(),
                    qps: vec![1.0, 2.0, 3.0, 4.0],
                    response_times: vec![0.1, 0.2, 0.3],
                },
                ServiceResults {
                    name: "c".to_string(),
                    ..ServiceResults::default()
                },
            ],
        };

        let mut presenter = ResultsPresenter::new();
        let view = presenter.present(&results);

        assert_eq!(view.throughput.series.len(), 3);
        assert_eq!(view.throughput.series[0].points, vec![Some(1.0), None, None]);
        assert_eq!(view.throughput.series[1].points.len(), 3);
        assert_eq!(view.latency.series[0].points, vec![None, None, None]);
        assert_eq!(view.throughput.series[2].max(), None);
        assert_eq!(view.throughput.series[1].max(), Some(3.0));
    }

    #[test]
    fn test_empty_results() {
        let mut presenter = ResultsPresenter::new();
        let view = presenter.present(&RunResults::default());
        assert!(view.throughput.series.is_empty());
        assert!(view.latency.x_labels.is_empty());
        assert!(view.table.is_empty());
    }

    #[test]
    fn test_present_releases_previous_plots() {
        let mut presenter = ResultsPresenter::new();
        presenter.present(&single_service());
        assert_eq!(presenter.throughput_slot().released(), 0);

        let view = presenter.present(&RunResults::default());
        assert_eq!(view.generation, 2);
        assert_eq!(presenter.throughput_slot().released(), 1);
        assert_eq!(presenter.latency_slot().released(), 1);
        assert_eq!(
            presenter.throughput_slot().current().unwrap().generation,
            2
        );
    }

    #[test]
    fn test_unnamed_service_gets_placeholder_label() {
        let mut presenter = ResultsPresenter::new();
        let view = presenter.present(&RunResults {
            concurrent_users: vec![1],
            services: vec![ServiceResults {
                name: String::new(),
                qps: vec![1.0],
                response_times: vec![0.1],
            }],
        });

        assert_eq!(view.throughput.series[0].label, "Service 1");
        assert_eq!(view.latency.series[0].label, "Service 1");
        assert_eq!(view.table[0].service, "Service 1");
    }

    #[test]
    fn test_clear() {
        let mut presenter = ResultsPresenter::new();
        presenter.present(&single_service());
        presenter.clear();
        assert!(presenter.current().is_none());
        assert!(presenter.latency_slot().current().is_none());
        assert_eq!(presenter.latency_slot().released(), 1);
    }
}
