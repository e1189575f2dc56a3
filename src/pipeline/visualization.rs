//! Step 5: group summary plots for significant features

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::data::trajectory::Group;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::pipeline::layout::OutputLayout;
use crate::pipeline::read_required_artifact;
use crate::pipeline::statistics::{read_comparisons, GroupComparison};
use crate::utils::io::{ensure_dir, format_float, write_atomic};

const GROUP_COLORS: [RGBColor; 3] = [
    RGBColor(46, 134, 193),
    RGBColor(241, 196, 15),
    RGBColor(192, 57, 43),
];

/// Significant features to plot: lowest p-value first, at most `max_plots`
pub fn select_features(comparisons: &[GroupComparison], max_plots: usize) -> Vec<&GroupComparison> {
    let mut significant: Vec<&GroupComparison> = comparisons.iter().filter(|c| c.significant).collect();
    significant.sort_by(|a, b| {
        a.p_value
            .partial_cmp(&b.p_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    significant.truncate(max_plots);
    significant
}

/// Plot-ready `feature, group, count, mean, std, plotted` table
pub fn plot_summary_csv(comparisons: &[GroupComparison], plotted: &HashSet<&str>) -> String {
    let mut out = String::from("feature,group,count,mean,std,plotted\n");
    for c in comparisons {
        for group in Group::ALL {
            let i = group.index();
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                c.feature,
                group.label(),
                c.counts[i],
                format_float(c.means[i]),
                format_float(c.stds[i]),
                plotted.contains(c.feature.as_str())
            ));
        }
    }
    out
}

/// Bar chart of group means with one standard deviation whiskers
pub fn render_group_plot(comparison: &GroupComparison, path: &Path) -> RqaResult<()> {
    let plot_err = |e: &dyn std::fmt::Display| RqaError::Plot {
        feature: comparison.feature.clone(),
        reason: e.to_string(),
    };

    let spread = |i: usize| {
        if comparison.stds[i].is_finite() {
            comparison.stds[i]
        } else {
            0.0
        }
    };
    let present: Vec<usize> = (0..3).filter(|&i| comparison.means[i].is_finite()).collect();
    let lo = present
        .iter()
        .map(|&i| comparison.means[i] - spread(i))
        .fold(0.0_f64, f64::min);
    let hi = present
        .iter()
        .map(|&i| comparison.means[i] + spread(i))
        .fold(0.0_f64, f64::max);
    let pad = ((hi - lo) * 0.1).max(1e-6);

    let root = SVGBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_err(&e))?;

    let caption = format!(
        "{} (F={:.2}, p={:.4})",
        comparison.feature, comparison.f_statistic, comparison.p_value
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0_f64..3.0_f64, (lo - pad)..(hi + pad))
        .map_err(|e| plot_err(&e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc(comparison.feature.as_str())
        .draw()
        .map_err(|e| plot_err(&e))?;

    for &i in &present {
        let x0 = i as f64 + 0.15;
        let x1 = i as f64 + 0.85;
        let center = i as f64 + 0.5;
        let mean = comparison.means[i];

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x0, 0.0), (x1, mean)],
                GROUP_COLORS[i].mix(0.8).filled(),
            )))
            .map_err(|e| plot_err(&e))?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(center, mean - spread(i)), (center, mean + spread(i))],
                BLACK.stroke_width(2),
            )))
            .map_err(|e| plot_err(&e))?;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{} (n={})", Group::ALL[i].label(), comparison.counts[i]),
                (x0, lo - pad * 0.5),
                ("sans-serif", 14).into_font(),
            )))
            .map_err(|e| plot_err(&e))?;
    }

    root.present().map_err(|e| plot_err(&e))?;
    Ok(())
}

/// Outcome of step 5
#[derive(Debug, Clone, Default)]
pub struct VisualizationSummary {
    pub plots: Vec<PathBuf>,
    pub summary_file: PathBuf,
}

/// Plot up to `max_plots` significant features and write the plot summary
///
/// With no significant features the step still completes, producing an
/// empty plot directory and the summary table.
pub fn render_plots(layout: &OutputLayout, max_plots: usize) -> RqaResult<VisualizationSummary> {
    let comparisons = read_required_artifact(
        ProcessingStage::Visualization,
        &layout.comparison_file(),
        read_comparisons,
    )?;

    let plots_dir = layout.plots_dir();
    ensure_dir(&plots_dir)?;

    let selected = select_features(&comparisons, max_plots);
    let mut plots = Vec::with_capacity(selected.len());
    for comparison in &selected {
        let path = layout.plot_file(&comparison.feature);
        write_plot(comparison, &plots_dir, &path)?;
        debug!(feature = %comparison.feature, path = %path.display(), "plot written");
        plots.push(path);
    }
    remove_stale_plots(&plots_dir, &plots)?;

    let plotted: HashSet<&str> = selected.iter().map(|c| c.feature.as_str()).collect();
    let summary_file = layout.plot_summary_file();
    write_atomic(&summary_file, plot_summary_csv(&comparisons, &plotted).as_bytes())?;

    Ok(VisualizationSummary {
        plots,
        summary_file,
    })
}

/// Render into a temporary file in `dir`, then move it over `path`
///
/// A failed render leaves the previous plot and no staging file behind.
fn write_plot(comparison: &GroupComparison, dir: &Path, path: &Path) -> RqaResult<()> {
    let staging = NamedTempFile::new_in(dir).map_err(|e| RqaError::io("create_temp", dir, e))?;
    render_group_plot(comparison, staging.path())?;
    staging
        .persist(path)
        .map_err(|e| RqaError::io("rename", path, e.error))?;
    Ok(())
}

fn remove_stale_plots(dir: &Path, keep: &[PathBuf]) -> RqaResult<()> {
    for entry in fs::read_dir(dir).map_err(|e| RqaError::io("read_dir", dir, e))? {
        let path = entry.map_err(|e| RqaError::io("read_dir", dir, e))?.path();
        let is_svg = path.extension().map(|e| e == "svg").unwrap_or(false);
        if is_svg && !keep.contains(&path) {
            fs::remove_file(&path).map_err(|e| RqaError::io("remove_file", &path, e))?;
        }
    }
    Ok(())
}
