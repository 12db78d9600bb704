//! Network and dataset serialization (feature: `serde`).
//!
//! This module defines a versioned JSON format for [`Network`] and [`Dataset`].
//!
//! Design notes:
//! - Internal tables are never serialized directly. A network is stored as its
//!   layer sizes, slot values, slot flags and per-layer activations; offsets and
//!   connection counters are derived again on load.
//! - Loading validates everything and reports problems as
//!   [`Error::InvalidData`].

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::network::LayerActivation;
use crate::{Activation, Dataset, Error, Matrix, Network, Result, Scalar};

pub const NETWORK_FORMAT_VERSION: u32 = 1;
pub const DATASET_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializedNetwork<T> {
    pub format_version: u32,
    pub name: String,
    /// Neurons per layer, input layer first.
    pub layers: Vec<usize>,
    /// All weight slots in absolute order (bias first within each neuron).
    pub weights: Vec<T>,
    pub active: Vec<bool>,
    /// One entry per non-input layer.
    pub activations: Vec<SerializedActivation<T>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SerializedActivation<T> {
    pub kind: SerializedActivationKind,
    pub param: T,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SerializedActivationKind {
    Threshold,
    SymThreshold,
    Linear,
    Sigmoid,
    SymSigmoid,
    SigmoidApprox,
    SymSigmoidApprox,
    Relu,
}

impl From<Activation> for SerializedActivationKind {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Threshold => Self::Threshold,
            Activation::SymThreshold => Self::SymThreshold,
            Activation::Linear => Self::Linear,
            Activation::Sigmoid => Self::Sigmoid,
            Activation::SymSigmoid => Self::SymSigmoid,
            Activation::SigmoidApprox => Self::SigmoidApprox,
            Activation::SymSigmoidApprox => Self::SymSigmoidApprox,
            Activation::Relu => Self::Relu,
        }
    }
}

impl From<SerializedActivationKind> for Activation {
    fn from(value: SerializedActivationKind) -> Self {
        match value {
            SerializedActivationKind::Threshold => Self::Threshold,
            SerializedActivationKind::SymThreshold => Self::SymThreshold,
            SerializedActivationKind::Linear => Self::Linear,
            SerializedActivationKind::Sigmoid => Self::Sigmoid,
            SerializedActivationKind::SymSigmoid => Self::SymSigmoid,
            SerializedActivationKind::SigmoidApprox => Self::SigmoidApprox,
            SerializedActivationKind::SymSigmoidApprox => Self::SymSigmoidApprox,
            SerializedActivationKind::Relu => Self::Relu,
        }
    }
}

impl<T: Scalar> SerializedNetwork<T> {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != NETWORK_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported network format_version {}; expected {}",
                self.format_version, NETWORK_FORMAT_VERSION
            )));
        }
        if self.weights.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }
        Ok(())
    }
}

impl<T: Scalar> From<&Network<T>> for SerializedNetwork<T> {
    fn from(net: &Network<T>) -> Self {
        Self {
            format_version: NETWORK_FORMAT_VERSION,
            name: net.name().to_owned(),
            layers: net.layers().to_vec(),
            weights: net.values().to_vec(),
            active: net.active_flags().to_vec(),
            activations: net
                .layer_activations()
                .iter()
                .map(|a| SerializedActivation {
                    kind: a.kind.into(),
                    param: a.param,
                })
                .collect(),
        }
    }
}

impl<T: Scalar> TryFrom<SerializedNetwork<T>> for Network<T> {
    type Error = Error;

    fn try_from(value: SerializedNetwork<T>) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let activations = value
            .activations
            .iter()
            .enumerate()
            .map(|(i, a)| {
                LayerActivation::new(a.kind.into(), Some(a.param))
                    .map_err(|e| {
                        Error::InvalidData(format!("layer {} activation invalid: {e}", i + 2))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Network::assemble(value.name, value.layers, value.active, value.weights, activations)
            .map_err(|e| Error::InvalidData(format!("network structure invalid: {e}")))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializedDataset<T> {
    pub format_version: u32,
    pub info: String,
    /// One row per record.
    pub inputs: Vec<Vec<T>>,
    pub outputs: Vec<Vec<T>>,
    /// Empty, or one label per record.
    #[serde(default)]
    pub record_info: Vec<String>,
}

fn matrix_rows<T: Scalar>(m: &Matrix<T>) -> Vec<Vec<T>> {
    (0..m.rows())
        .map(|r| (0..m.cols()).map(|c| m.at(r, c)).collect())
        .collect()
}

impl<T: Scalar> From<&Dataset<T>> for SerializedDataset<T> {
    fn from(data: &Dataset<T>) -> Self {
        let record_info = if data.record_infos().iter().all(String::is_empty) {
            Vec::new()
        } else {
            data.record_infos().to_vec()
        };
        Self {
            format_version: DATASET_FORMAT_VERSION,
            info: data.info().to_owned(),
            inputs: matrix_rows(data.input()),
            outputs: matrix_rows(data.output()),
            record_info,
        }
    }
}

impl<T: Scalar> TryFrom<SerializedDataset<T>> for Dataset<T> {
    type Error = Error;

    fn try_from(value: SerializedDataset<T>) -> std::result::Result<Self, Self::Error> {
        if value.format_version != DATASET_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported dataset format_version {}; expected {}",
                value.format_version, DATASET_FORMAT_VERSION
            )));
        }
        Dataset::from_rows(&value.inputs, &value.outputs)
            .and_then(|data| data.with_info(value.info, value.record_info))
            .map_err(|e| Error::InvalidData(format!("dataset structure invalid: {e}")))
    }
}

fn write_file(path: &Path, s: String) -> Result<()> {
    std::fs::write(path, s)
        .map_err(|e| Error::InvalidData(format!("failed to write {}: {e}", path.display())))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidData(format!("failed to read {}: {e}", path.display())))
}

impl<T: Scalar + Serialize + DeserializeOwned> Network<T> {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&SerializedNetwork::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Serialize the network to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&SerializedNetwork::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Parse a network from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork<T> = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse network json: {e}")))?;
        ser.try_into()
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), self.to_json_string_pretty()?)
    }

    /// Load a network from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&read_file(path.as_ref())?)
    }
}

impl<T: Scalar + Serialize + DeserializeOwned> Dataset<T> {
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&SerializedDataset::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize dataset: {e}")))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&SerializedDataset::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize dataset: {e}")))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedDataset<T> = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse dataset json: {e}")))?;
        ser.try_into()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), self.to_json_string_pretty()?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&read_file(path.as_ref())?)
    }
}
