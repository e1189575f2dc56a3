//! Per-signature output directory layout

use std::path::{Path, PathBuf};

use crate::config::constants::paths::*;
use crate::data::params::ParameterCombination;
use crate::data::trajectory::Group;

/// All output paths owned by one parameter combination
///
/// Everything lives beneath `{output_root}/{signature}/`; no two
/// combinations share a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(output_root: &Path, params: &ParameterCombination) -> Self {
        Self::for_signature(output_root, &params.signature())
    }

    pub fn for_signature(output_root: &Path, signature: &str) -> Self {
        Self {
            root: output_root.join(signature),
        }
    }

    /// `{output_root}/{signature}`
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn step1_dir(&self) -> PathBuf {
        self.root.join(STEP1_DIR)
    }

    pub fn step1_group_dir(&self, group: Group) -> PathBuf {
        self.step1_dir().join(group.label())
    }

    pub fn step1_file(&self, group: Group, record_id: &str) -> PathBuf {
        self.step1_group_dir(group)
            .join(format!("{}{}", record_id, STEP1_SUFFIX))
    }

    pub fn merged_file(&self) -> PathBuf {
        self.root.join(STEP2_DIR).join(MERGED_FILE)
    }

    pub fn enriched_file(&self) -> PathBuf {
        self.root.join(STEP3_DIR).join(ENRICHED_FILE)
    }

    pub fn comparison_file(&self) -> PathBuf {
        self.root.join(STEP4_DIR).join(COMPARISON_FILE)
    }

    pub fn step5_dir(&self) -> PathBuf {
        self.root.join(STEP5_DIR)
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.step5_dir().join(PLOTS_DIR)
    }

    pub fn plot_summary_file(&self) -> PathBuf {
        self.step5_dir().join(PLOT_SUMMARY_FILE)
    }

    pub fn plot_file(&self, feature: &str) -> PathBuf {
        self.plots_dir().join(format!("{}.svg", feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let params = ParameterCombination::new(2, 1, 0.1, 2).unwrap();
        let layout = OutputLayout::new(Path::new("/out"), &params);

        assert_eq!(layout.root(), Path::new("/out/m2_tau1_eps0.100_lmin2"));
        assert_eq!(
            layout.step1_file(Group::Mci, "m3q2"),
            Path::new("/out/m2_tau1_eps0.100_lmin2/step1_rqa_features/mci/m3q2_rqa.csv")
        );
        assert!(layout
            .comparison_file()
            .ends_with("step4_statistical_analysis/group_comparison.csv"));
        assert!(layout
            .plot_file("det_x")
            .ends_with("step5_visualization/statistical_plots/det_x.svg"));
    }
}
