//! Build-time configuration for the correction workflows.
//!
//! Both configurations are plain data: they serialize to JSON so a run can
//! record exactly which topology it built.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use sdc_graph::RegistrationPreset;

/// Options for the fieldmap-based workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldmapUnwarpConfig {
    /// Workflow name.
    pub name: String,
    /// The fieldmap was smoothed/fitted upstream, so shift estimation runs
    /// without a tissue mask.
    pub fmap_bspline: bool,
    /// Demean the shift map within the fieldmap mask.
    pub fmap_demean: bool,
    pub registration: RegistrationPreset,
    /// Destination for report artifacts. Report-sink nodes are only built
    /// when this is set.
    pub reportlets: Option<PathBuf>,
}

impl Default for FieldmapUnwarpConfig {
    fn default() -> Self {
        Self {
            name: "sdc_unwarp_wf".to_string(),
            fmap_bspline: false,
            fmap_demean: true,
            registration: RegistrationPreset::Standard,
            reportlets: None,
        }
    }
}

impl FieldmapUnwarpConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fmap_bspline(mut self, fmap_bspline: bool) -> Self {
        self.fmap_bspline = fmap_bspline;
        self
    }

    pub fn with_fmap_demean(mut self, fmap_demean: bool) -> Self {
        self.fmap_demean = fmap_demean;
        self
    }

    pub fn with_registration(mut self, preset: RegistrationPreset) -> Self {
        self.registration = preset;
        self
    }

    pub fn with_reportlets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reportlets = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::InvalidConfiguration("workflow name is empty".into()));
        }
        Ok(())
    }
}

/// Which images the PEPOLAR merge step concatenates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeInputs {
    /// Brain-masked reference plus the skull-stripped, bias-corrected volumes.
    #[default]
    Masked,
    /// Raw reference plus the header-repaired, bias-corrected volumes. No
    /// skull-stripping nodes are built.
    Unmasked,
}

/// Options for the phase-encoding-polarity workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PepolarUnwarpConfig {
    pub name: String,
    /// Opposite-phase-encoded volumes, in the order they are merged.
    pub fmaps: Vec<PathBuf>,
    /// Root for metadata lookup of relative volume paths.
    pub bids_dir: PathBuf,
    pub merge_inputs: MergeInputs,
}

impl Default for PepolarUnwarpConfig {
    fn default() -> Self {
        Self {
            name: "pepolar_unwarp_wf".to_string(),
            fmaps: Vec::new(),
            bids_dir: PathBuf::new(),
            merge_inputs: MergeInputs::Masked,
        }
    }
}

impl PepolarUnwarpConfig {
    pub fn new<P: Into<PathBuf>>(fmaps: impl IntoIterator<Item = P>, bids_dir: impl Into<PathBuf>) -> Self {
        Self {
            fmaps: fmaps.into_iter().map(Into::into).collect(),
            bids_dir: bids_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_merge_inputs(mut self, merge_inputs: MergeInputs) -> Self {
        self.merge_inputs = merge_inputs;
        self
    }

    /// Volume paths resolved against `bids_dir`.
    pub fn resolved_fmaps(&self) -> Vec<PathBuf> {
        self.fmaps.iter().map(|p| resolve(&self.bids_dir, p)).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.fmaps.is_empty() {
            return Err(WorkflowError::EmptyFmaps);
        }
        if self.name.trim().is_empty() {
            return Err(WorkflowError::InvalidConfiguration("workflow name is empty".into()));
        }
        Ok(())
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || root.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fieldmap_defaults() {
        let config = FieldmapUnwarpConfig::default();
        assert!(config.fmap_demean);
        assert!(!config.fmap_bspline);
        assert_eq!(config.registration, RegistrationPreset::Standard);
        assert!(config.reportlets.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: FieldmapUnwarpConfig =
            serde_json::from_str(r#"{"fmap_demean": false, "registration": "testing"}"#).unwrap();
        assert!(!config.fmap_demean);
        assert_eq!(config.registration, RegistrationPreset::Testing);
        assert_eq!(config.name, "sdc_unwarp_wf");
    }

    #[test]
    fn test_pepolar_paths_resolve_against_root() {
        let config = PepolarUnwarpConfig::new(["sub-01/fmap/sub-01_dir-AP_epi.nii.gz", "/abs/epi.nii.gz"], "/data/bids");
        assert_eq!(
            config.resolved_fmaps(),
            vec![
                PathBuf::from("/data/bids/sub-01/fmap/sub-01_dir-AP_epi.nii.gz"),
                PathBuf::from("/abs/epi.nii.gz"),
            ]
        );
    }

    #[test]
    fn test_pepolar_rejects_empty_fmaps() {
        let config = PepolarUnwarpConfig::new(Vec::<PathBuf>::new(), "/data");
        assert_eq!(config.validate(), Err(WorkflowError::EmptyFmaps));
    }
}
