//! Data model: parameter combinations, trajectories and feature tables

pub mod params;
pub mod synthetic;
pub mod table;
pub mod trajectory;

pub use params::{GridExpansion, ParameterCombination, ParameterGrid, RangeSpec};
pub use synthetic::{write_synthetic_dataset, SyntheticDatasetSpec, SyntheticGazeGenerator};
pub use table::{FeatureRow, FeatureTable};
pub use trajectory::{discover_trajectories, GazeTrajectory, Group, TaskId, TrajectoryFile};
