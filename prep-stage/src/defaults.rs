//! Default pipeline parameter tree
//!
//! Builds the canonical `user_params.json` tree: one `load_data` section
//! with data selection and run policy, and one `preprocess` section with a
//! sub-mapping per processing step. Compiled-in defaults live here.

use crate::error::{StageError, StageResult};
use crate::writer::to_indented_json;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Parameter file written by [`build_defaults`]
pub const CONFIG_FILE_NAME: &str = "user_params.json";

/// Keyword standing for "every subject/task" in the parameter file
const ALL_KEYWORD: &str = "all";

/// Subject or task selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Everything found under the data root
    #[default]
    All,
    /// Only the listed identifiers
    Subset(BTreeSet<String>),
}

impl Selection {
    pub fn subset<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Subset(items.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, id: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Subset(items) => items.contains(id),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selection::All => serializer.serialize_str(ALL_KEYWORD),
            Selection::Subset(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyword(String),
            Items(BTreeSet<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Keyword(k) if k.eq_ignore_ascii_case(ALL_KEYWORD) => Ok(Selection::All),
            Raw::Keyword(k) => Err(de::Error::custom(format!(
                "expected \"{}\" or a list of identifiers, found \"{}\"",
                ALL_KEYWORD, k
            ))),
            Raw::Items(items) => Ok(Selection::Subset(items)),
        }
    }
}

/// Recordings left out of an otherwise selected set
///
/// Empty sets omit nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exceptions {
    #[serde(default)]
    pub subjects: BTreeSet<String>,
    #[serde(default)]
    pub tasks: BTreeSet<String>,
    #[serde(default)]
    pub runs: BTreeSet<String>,
}

impl Exceptions {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.tasks.is_empty() && self.runs.is_empty()
    }
}

/// Data loading and run policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadParams {
    pub root: PathBuf,
    pub output_root: PathBuf,
    pub subjects: Selection,
    pub tasks: Selection,
    pub exceptions: Exceptions,
    pub channel_type: String,
    pub exit_on_error: bool,
    pub overwrite: bool,
    pub parallel_runs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceParams {
    pub ref_channels: String,
}

impl Default for ReferenceParams {
    fn default() -> Self {
        Self {
            ref_channels: "average".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MontageParams {
    pub montage: String,
}

impl Default for MontageParams {
    fn default() -> Self {
        Self {
            montage: "standard_1020".to_string(),
        }
    }
}

/// Band-pass cut-offs in Hz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub l_freq: Option<f64>,
    pub h_freq: Option<f64>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            l_freq: Some(0.3),
            h_freq: Some(40.0),
        }
    }
}

/// Bad-channel identification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyParams {
    pub deviation_threshold: f64,
    pub correlation_threshold: f64,
    pub ransac: bool,
}

impl Default for IdentifyParams {
    fn default() -> Self {
        Self {
            deviation_threshold: 5.0,
            correlation_threshold: 0.4,
            ransac: false,
        }
    }
}

/// Epoching window in seconds relative to each event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentParams {
    pub tmin: f64,
    pub tmax: f64,
    pub baseline: Option<(Option<f64>, Option<f64>)>,
    pub picks: Option<Vec<String>>,
    pub reject_tmin: Option<f64>,
    pub reject_tmax: Option<f64>,
    pub decim: u32,
    pub verbose: bool,
    pub preload: bool,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            tmin: -0.2,
            tmax: 0.5,
            baseline: None,
            picks: None,
            reject_tmin: None,
            reject_tmax: None,
            decim: 1,
            verbose: false,
            preload: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolateParams {
    pub mode: String,
    pub method: Option<String>,
    pub reset_bads: bool,
}

impl Default for InterpolateParams {
    fn default() -> Self {
        Self {
            mode: "accurate".to_string(),
            method: None,
            reset_bads: true,
        }
    }
}

/// Step without tunable parameters; serializes as `{}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoParams {}

/// One sub-mapping per processing step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    pub set_reference: ReferenceParams,
    pub set_montage: MontageParams,
    pub filter_data: FilterParams,
    pub identify_badchans_raw: IdentifyParams,
    pub ica_raw: NoParams,
    pub segment_data: SegmentParams,
    pub final_eeg: NoParams,
    pub interpolate_data: InterpolateParams,
    pub average_reference: NoParams,
}

/// Complete pipeline parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    pub load_data: LoadParams,
    pub preprocess: PreprocessParams,
}

/// Inputs to [`build_defaults`]
#[derive(Debug, Clone, Default)]
pub struct DefaultsRequest {
    pub root: PathBuf,
    pub output_root: PathBuf,
    pub subjects: Selection,
    pub tasks: Selection,
    pub except_subjects: BTreeSet<String>,
    pub except_tasks: BTreeSet<String>,
    pub except_runs: BTreeSet<String>,
    /// Directory to write `user_params.json` into, if any
    pub write_to: Option<PathBuf>,
}

impl DefaultsRequest {
    pub fn new(root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_root: output_root.into(),
            ..Default::default()
        }
    }
}

/// Build the default tree, writing it out when `write_to` is set
pub async fn build_defaults(request: DefaultsRequest) -> StageResult<ConfigTree> {
    let DefaultsRequest {
        root,
        output_root,
        subjects,
        tasks,
        except_subjects,
        except_tasks,
        except_runs,
        write_to,
    } = request;

    let tree = ConfigTree {
        load_data: LoadParams {
            root,
            output_root,
            subjects,
            tasks,
            exceptions: Exceptions {
                subjects: except_subjects,
                tasks: except_tasks,
                runs: except_runs,
            },
            channel_type: "eeg".to_string(),
            exit_on_error: false,
            overwrite: false,
            parallel_runs: 1,
        },
        preprocess: PreprocessParams::default(),
    };

    if let Some(dir) = write_to {
        let path = write_config(&tree, &dir).await?;
        tracing::info!(path = %path.display(), "Wrote default parameter file");
    }

    Ok(tree)
}

/// Write `tree` as `user_params.json` under `dir`; returns the file path
pub async fn write_config(tree: &ConfigTree, dir: &Path) -> StageResult<PathBuf> {
    let bytes = to_indented_json(tree)?;
    let path = dir.join(CONFIG_FILE_NAME);
    prep_common::fs::write_atomic(&path, &bytes).await?;
    Ok(path)
}

/// Read a parameter file back
pub async fn load_config(path: &Path) -> StageResult<ConfigTree> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        StageError::Serialization(format!("{}: {}", path.display(), e))
    })
}
