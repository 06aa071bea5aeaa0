//! Dataset identities and the catalog of where their rasters live
//!
//! The catalog is an explicit value loaded from YAML and handed to whoever
//! needs it; nothing here is cached in process-wide state.
//!
//! ```yaml
//! input_dir: data/input
//! datasets:
//!   synth:
//!     hmax: data/synth/hmax_stack.tif
//!     hfin: data/synth/hfin_stack.tif
//!     vmax: https://example.org/ndownloader/files/123
//!     pmax: data/synth/pmax_stack.tif
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default flow-height threshold (m) used throughout the analysis
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// A named collection of simulation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    Synth,
    SynthPem,
    SynthValidate,
    Acheron,
    AcheronPem,
    AcheronValidate,
}

impl DatasetName {
    pub const ALL: [DatasetName; 6] = [
        DatasetName::Synth,
        DatasetName::SynthPem,
        DatasetName::SynthValidate,
        DatasetName::Acheron,
        DatasetName::AcheronPem,
        DatasetName::AcheronValidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::Synth => "synth",
            DatasetName::SynthPem => "synth_pem",
            DatasetName::SynthValidate => "synth_validate",
            DatasetName::Acheron => "acheron",
            DatasetName::AcheronPem => "acheron_pem",
            DatasetName::AcheronValidate => "acheron_validate",
        }
    }

    /// The training set this dataset belongs to
    pub fn base(&self) -> DatasetName {
        match self {
            DatasetName::Synth | DatasetName::SynthPem | DatasetName::SynthValidate => {
                DatasetName::Synth
            }
            _ => DatasetName::Acheron,
        }
    }

    pub fn is_base(&self) -> bool {
        self.base() == *self
    }

    /// Point-estimate-method runs of the same scene
    pub fn pem(&self) -> DatasetName {
        match self.base() {
            DatasetName::Synth => DatasetName::SynthPem,
            _ => DatasetName::AcheronPem,
        }
    }

    /// Held-out validation runs of the same scene
    pub fn validation(&self) -> DatasetName {
        match self.base() {
            DatasetName::Synth => DatasetName::SynthValidate,
            _ => DatasetName::AcheronValidate,
        }
    }

    /// Require a base (training) dataset, as emulators and moment analyses do.
    pub fn require_base(&self) -> Result<()> {
        if self.is_base() {
            Ok(())
        } else {
            Err(Error::invalid(
                "name",
                self,
                "emulators and moment analyses take a base dataset: synth or acheron",
            ))
        }
    }

    /// Location at which point quantities are extracted for this scene
    pub fn default_location(&self) -> Location {
        match self.base() {
            DatasetName::Synth => Location { x: 1000.0, y: 2000.0 },
            _ => Location {
                x: 1_490_100.0,
                y: 5_204_100.0,
            },
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DatasetName::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| {
                Error::invalid(
                    "name",
                    s,
                    "must be synth, synth_pem, synth_validate, acheron, acheron_pem or acheron_validate",
                )
            })
    }
}

/// Per-cell simulation output quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qoi {
    /// Maximum flow height
    Hmax,
    /// Final (deposited) height
    Hfin,
    /// Maximum flow velocity
    Vmax,
    /// Maximum flow pressure
    Pmax,
}

impl Qoi {
    pub const ALL: [Qoi; 4] = [Qoi::Hmax, Qoi::Hfin, Qoi::Vmax, Qoi::Pmax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Qoi::Hmax => "hmax",
            Qoi::Hfin => "hfin",
            Qoi::Vmax => "vmax",
            Qoi::Pmax => "pmax",
        }
    }

    /// Quantities that can be extracted at a point or emulated as a field.
    ///
    /// `hfin` only feeds deposit area and volume.
    pub fn require_field(&self) -> Result<()> {
        match self {
            Qoi::Hfin => Err(Error::invalid("qoi", self, "must be hmax, vmax or pmax")),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Qoi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Qoi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Qoi::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| Error::invalid("qoi", s, "must be hmax, hfin, vmax or pmax"))
    }
}

/// A map coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    /// Validated coordinate (both components finite)
    pub fn new(x: f64, y: f64) -> Result<Self> {
        if !x.is_finite() {
            return Err(Error::invalid("loc_x", x, "x-coordinate must be a finite number"));
        }
        if !y.is_finite() {
            return Err(Error::invalid("loc_y", y, "y-coordinate must be a finite number"));
        }
        Ok(Self { x, y })
    }
}

/// Where a raster stack lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterLocation {
    Local(PathBuf),
    Remote(String),
}

impl RasterLocation {
    /// `http://` and `https://` strings are remote, anything else a path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            RasterLocation::Remote(s.to_string())
        } else {
            RasterLocation::Local(PathBuf::from(s))
        }
    }

    /// Resolve relative paths against `root`.
    fn rooted(self, root: &Path) -> Self {
        match self {
            RasterLocation::Local(p) if p.is_relative() => RasterLocation::Local(root.join(p)),
            other => other,
        }
    }
}

impl fmt::Display for RasterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterLocation::Local(p) => write!(f, "{}", p.display()),
            RasterLocation::Remote(url) => f.write_str(url),
        }
    }
}

/// Resolved raster locations of one dataset, keyed by quantity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QoiLocations {
    entries: BTreeMap<Qoi, RasterLocation>,
}

impl QoiLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, qoi: Qoi, location: RasterLocation) {
        self.entries.insert(qoi, location);
    }

    pub fn get(&self, qoi: Qoi) -> Result<&RasterLocation> {
        self.entries
            .get(&qoi)
            .ok_or_else(|| Error::Config(format!("no raster configured for {qoi}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Qoi, &RasterLocation)> {
        self.entries.iter()
    }
}

/// Analysis whose sampled input parameters are stored as CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    /// Design used to train (or validate) emulators
    Emulator,
    /// Monte Carlo sample set for COV scenario 1..=3
    Mcs(u8),
}

impl Analysis {
    pub fn file_suffix(&self) -> String {
        match self {
            Analysis::Emulator => "emulator".to_string(),
            Analysis::Mcs(i) => format!("mcs{i}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_input_dir")]
    input_dir: PathBuf,
    #[serde(default)]
    datasets: BTreeMap<DatasetName, BTreeMap<Qoi, String>>,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

/// Static mapping from dataset names to raster and input locations
#[derive(Debug, Clone)]
pub struct Catalog {
    input_dir: PathBuf,
    datasets: BTreeMap<DatasetName, QoiLocations>,
}

impl Catalog {
    /// A catalog with no datasets, reading input CSVs from `input_dir`.
    pub fn with_input_dir<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            datasets: BTreeMap::new(),
        }
    }

    /// Parse a catalog; relative paths stay relative to the working directory.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::parse(yaml, None)
    }

    /// Load a catalog file; relative paths resolve against its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let root = path.parent().filter(|p| !p.as_os_str().is_empty());
        tracing::debug!(path = %path.display(), "loading catalog");
        Self::parse(&text, root)
    }

    fn parse(yaml: &str, root: Option<&Path>) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;

        let input_dir = match root {
            Some(r) if file.input_dir.is_relative() => r.join(&file.input_dir),
            _ => file.input_dir,
        };

        let datasets = file
            .datasets
            .into_iter()
            .map(|(name, qois)| {
                let mut locations = QoiLocations::new();
                for (qoi, raw) in qois {
                    let mut loc = RasterLocation::parse(&raw);
                    if let Some(r) = root {
                        loc = loc.rooted(r);
                    }
                    locations.insert(qoi, loc);
                }
                (name, locations)
            })
            .collect();

        Ok(Self { input_dir, datasets })
    }

    /// Raster locations of a dataset
    pub fn locations(&self, name: DatasetName) -> Result<&QoiLocations> {
        self.datasets
            .get(&name)
            .ok_or_else(|| Error::Config(format!("dataset {name} is not in the catalog")))
    }

    /// Whether the catalog lists a dataset
    pub fn contains(&self, name: DatasetName) -> bool {
        self.datasets.contains_key(&name)
    }

    /// `<input_dir>/<name>_<analysis>.csv`
    pub fn input_path(&self, name: DatasetName, analysis: Analysis) -> PathBuf {
        self.input_dir
            .join(format!("{}_{}.csv", name.as_str(), analysis.file_suffix()))
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}
