//! LSTM stress classifier
//!
//! Pure-Rust inference for the deployed network:
//!
//! ```text
//! input [T, 4] -> LSTM (1 layer, hidden H) -> h_T
//!              -> Linear(H, F) -> ReLU -> Linear(F, 2) -> softmax -> P(class 1)
//! ```
//!
//! Weights come from a JSON export of the trained state dict, keyed by the
//! original parameter names. Dropout is inactive at inference and has no
//! parameters, which is why the second linear layer is `fc.3`.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::StressClassifier;
use crate::error::ComputeError;
use crate::types::{NormalizedSequence, FEATURE_COUNT};

/// Number of LSTM gates (input, forget, cell, output)
const GATES: usize = 4;

/// Number of output classes (calm, stressed)
const CLASSES: usize = 2;

#[derive(Debug, Deserialize)]
struct StateDict {
    #[serde(rename = "lstm.weight_ih_l0")]
    weight_ih: Vec<Vec<f64>>,
    #[serde(rename = "lstm.weight_hh_l0")]
    weight_hh: Vec<Vec<f64>>,
    #[serde(rename = "lstm.bias_ih_l0")]
    bias_ih: Vec<f64>,
    #[serde(rename = "lstm.bias_hh_l0")]
    bias_hh: Vec<f64>,
    #[serde(rename = "fc.0.weight")]
    fc1_weight: Vec<Vec<f64>>,
    #[serde(rename = "fc.0.bias")]
    fc1_bias: Vec<f64>,
    #[serde(rename = "fc.3.weight")]
    fc2_weight: Vec<Vec<f64>>,
    #[serde(rename = "fc.3.bias")]
    fc2_bias: Vec<f64>,
}

/// Dense row-major matrix
#[derive(Debug, Clone)]
struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    fn from_rows(
        name: &str,
        rows: Vec<Vec<f64>>,
        expected_rows: usize,
        expected_cols: usize,
    ) -> Result<Self, ComputeError> {
        if rows.len() != expected_rows {
            return Err(shape_error(name, expected_rows, expected_cols, rows.len(), None));
        }

        let mut data = Vec::with_capacity(expected_rows * expected_cols);
        for row in rows {
            if row.len() != expected_cols {
                return Err(shape_error(
                    name,
                    expected_rows,
                    expected_cols,
                    expected_rows,
                    Some(row.len()),
                ));
            }
            data.extend(row);
        }
        check_finite(name, &data)?;

        Ok(Self {
            rows: expected_rows,
            cols: expected_cols,
            data,
        })
    }

    /// `out += self * x`
    fn mul_add(&self, x: &[f64], out: &mut [f64]) {
        for (r, acc) in out.iter_mut().enumerate().take(self.rows) {
            let row = &self.data[r * self.cols..(r + 1) * self.cols];
            *acc += row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        }
    }
}

fn shape_error(
    name: &str,
    rows: usize,
    cols: usize,
    got_rows: usize,
    got_cols: Option<usize>,
) -> ComputeError {
    let got = match got_cols {
        Some(c) => format!("a row of width {c}"),
        None => format!("{got_rows} rows"),
    };
    ComputeError::Startup(format!("{name}: expected shape [{rows}, {cols}], got {got}"))
}

fn check_vector(name: &str, v: Vec<f64>, expected: usize) -> Result<Vec<f64>, ComputeError> {
    if v.len() != expected {
        return Err(ComputeError::Startup(format!(
            "{name}: expected length {expected}, got {}",
            v.len()
        )));
    }
    check_finite(name, &v)?;
    Ok(v)
}

fn check_finite(name: &str, values: &[f64]) -> Result<(), ComputeError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ComputeError::Startup(format!("{name}: contains non-finite values")));
    }
    Ok(())
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// LSTM classifier loaded once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct LstmClassifier {
    hidden: usize,
    weight_ih: Matrix,
    weight_hh: Matrix,
    /// `bias_ih + bias_hh`, folded at load time
    bias: Vec<f64>,
    fc1_weight: Matrix,
    fc1_bias: Vec<f64>,
    fc2_weight: Matrix,
    fc2_bias: Vec<f64>,
}

impl LstmClassifier {
    /// Parse and shape-check an exported state dict
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let dict: StateDict = serde_json::from_str(json)
            .map_err(|e| ComputeError::Startup(format!("invalid classifier weights: {e}")))?;
        Self::from_state_dict(dict)
    }

    /// Load weights from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ComputeError::Startup(format!("cannot read weights {}: {e}", path.display()))
        })?;
        let classifier = Self::from_json(&json)?;
        log::info!(
            "loaded LSTM classifier from {} (hidden={}, fc={})",
            path.display(),
            classifier.hidden,
            classifier.fc1_weight.rows
        );
        Ok(classifier)
    }

    fn from_state_dict(dict: StateDict) -> Result<Self, ComputeError> {
        let gate_rows = dict.weight_ih.len();
        if gate_rows == 0 || gate_rows % GATES != 0 {
            return Err(ComputeError::Startup(format!(
                "lstm.weight_ih_l0: row count {gate_rows} is not a positive multiple of {GATES}"
            )));
        }
        let hidden = gate_rows / GATES;

        let weight_ih =
            Matrix::from_rows("lstm.weight_ih_l0", dict.weight_ih, gate_rows, FEATURE_COUNT)?;
        let weight_hh =
            Matrix::from_rows("lstm.weight_hh_l0", dict.weight_hh, gate_rows, hidden)?;
        let bias_ih = check_vector("lstm.bias_ih_l0", dict.bias_ih, gate_rows)?;
        let bias_hh = check_vector("lstm.bias_hh_l0", dict.bias_hh, gate_rows)?;
        let bias = bias_ih.iter().zip(&bias_hh).map(|(a, b)| a + b).collect();

        let fc_width = dict.fc1_weight.len();
        if fc_width == 0 {
            return Err(ComputeError::Startup(
                "fc.0.weight: must have at least one row".to_string(),
            ));
        }
        let fc1_weight = Matrix::from_rows("fc.0.weight", dict.fc1_weight, fc_width, hidden)?;
        let fc1_bias = check_vector("fc.0.bias", dict.fc1_bias, fc_width)?;
        let fc2_weight = Matrix::from_rows("fc.3.weight", dict.fc2_weight, CLASSES, fc_width)?;
        let fc2_bias = check_vector("fc.3.bias", dict.fc2_bias, CLASSES)?;

        Ok(Self {
            hidden,
            weight_ih,
            weight_hh,
            bias,
            fc1_weight,
            fc1_bias,
            fc2_weight,
            fc2_bias,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// Run the recurrent layer and return the final hidden state
    fn last_hidden(&self, sequence: &NormalizedSequence) -> Vec<f64> {
        let h_size = self.hidden;
        let mut h = vec![0.0; h_size];
        let mut c = vec![0.0; h_size];
        let mut gates = vec![0.0; GATES * h_size];

        for step in sequence.steps() {
            gates.copy_from_slice(&self.bias);
            self.weight_ih.mul_add(step.as_array(), &mut gates);
            self.weight_hh.mul_add(&h, &mut gates);

            for j in 0..h_size {
                let input = sigmoid(gates[j]);
                let forget = sigmoid(gates[h_size + j]);
                let cell = gates[2 * h_size + j].tanh();
                let output = sigmoid(gates[3 * h_size + j]);

                c[j] = forget * c[j] + input * cell;
                h[j] = output * c[j].tanh();
            }
        }

        h
    }

    fn logits(&self, hidden: &[f64]) -> [f64; CLASSES] {
        let mut fc1 = self.fc1_bias.clone();
        self.fc1_weight.mul_add(hidden, &mut fc1);
        for v in fc1.iter_mut() {
            *v = v.max(0.0);
        }

        let mut logits = [self.fc2_bias[0], self.fc2_bias[1]];
        self.fc2_weight.mul_add(&fc1, &mut logits);
        logits
    }
}

impl StressClassifier for LstmClassifier {
    fn infer(&self, sequence: &NormalizedSequence) -> Result<f64, ComputeError> {
        let hidden = self.last_hidden(sequence);
        let [calm, stressed] = self.logits(&hidden);
        // Two-class softmax reduces to a sigmoid of the logit gap
        Ok(sigmoid(stressed - calm))
    }

    fn name(&self) -> &str {
        "lstm"
    }
}

/// State dict JSON with zero recurrent/fc weights and the given output bias
#[cfg(test)]
pub(crate) fn test_state_dict_json(hidden: usize, fc: usize, class_bias: [f64; 2]) -> String {
    let zeros = |rows: usize, cols: usize| vec![vec![0.0; cols]; rows];
    serde_json::json!({
        "lstm.weight_ih_l0": zeros(GATES * hidden, FEATURE_COUNT),
        "lstm.weight_hh_l0": zeros(GATES * hidden, hidden),
        "lstm.bias_ih_l0": vec![0.0; GATES * hidden],
        "lstm.bias_hh_l0": vec![0.0; GATES * hidden],
        "fc.0.weight": zeros(fc, hidden),
        "fc.0.bias": vec![0.0; fc],
        "fc.3.weight": zeros(CLASSES, fc),
        "fc.3.bias": class_bias,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureVector;

    fn window(step: [f64; 4], len: usize) -> NormalizedSequence {
        NormalizedSequence::new(vec![FeatureVector(step); len])
    }

    #[test]
    fn test_zero_network_is_undecided() {
        let classifier =
            LstmClassifier::from_json(&test_state_dict_json(8, 4, [0.0, 0.0])).unwrap();
        assert_eq!(classifier.hidden_size(), 8);

        let p = classifier.infer(&window([1.0, -2.0, 0.5, 3.0], 10)).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_output_bias_drives_softmax() {
        let classifier =
            LstmClassifier::from_json(&test_state_dict_json(2, 3, [0.0, 3f64.ln()])).unwrap();
        let p = classifier.infer(&window([0.0; 4], 10)).unwrap();
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_unit_forward_pass() {
        // One hidden unit; only the input and cell gates see feature 0
        let json = serde_json::json!({
            "lstm.weight_ih_l0": [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0]
            ],
            "lstm.weight_hh_l0": [[0.0], [0.0], [0.0], [0.0]],
            "lstm.bias_ih_l0": [0.0, 0.0, 0.0, 0.0],
            "lstm.bias_hh_l0": [0.0, 0.0, 0.0, 0.0],
            "fc.0.weight": [[1.0]],
            "fc.0.bias": [0.0],
            "fc.3.weight": [[0.0], [1.0]],
            "fc.3.bias": [0.0, 0.0],
        })
        .to_string();
        let classifier = LstmClassifier::from_json(&json).unwrap();

        let p = classifier.infer(&window([0.5, 0.0, 0.0, 0.0], 1)).unwrap();

        let c = sigmoid(0.5) * 0.5f64.tanh();
        let h = 0.5 * c.tanh();
        let expected = 1.0 / (1.0 + (-h).exp());
        assert!((p - expected).abs() < 1e-12, "{p} != {expected}");
    }

    #[test]
    fn test_recurrence_accumulates_over_steps() {
        let json = serde_json::json!({
            "lstm.weight_ih_l0": [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0]
            ],
            "lstm.weight_hh_l0": [[0.0], [5.0], [0.0], [0.0]],
            "lstm.bias_ih_l0": [0.0, 0.0, 0.0, 0.0],
            "lstm.bias_hh_l0": [0.0, 0.0, 0.0, 0.0],
            "fc.0.weight": [[1.0]],
            "fc.0.bias": [0.0],
            "fc.3.weight": [[0.0], [1.0]],
            "fc.3.bias": [0.0, 0.0],
        })
        .to_string();
        let classifier = LstmClassifier::from_json(&json).unwrap();

        let short = classifier.infer(&window([1.0, 0.0, 0.0, 0.0], 1)).unwrap();
        let long = classifier.infer(&window([1.0, 0.0, 0.0, 0.0], 10)).unwrap();
        assert!(long > short);
        assert!(long < 1.0);
    }

    #[test]
    fn test_rejects_wrong_input_width() {
        let mut value: serde_json::Value =
            serde_json::from_str(&test_state_dict_json(2, 3, [0.0, 0.0])).unwrap();
        value["lstm.weight_ih_l0"] = serde_json::json!(vec![vec![0.0; 3]; 8]);

        let err = LstmClassifier::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ComputeError::Startup(_)));
        assert!(err.to_string().contains("lstm.weight_ih_l0"));
    }

    #[test]
    fn test_rejects_mismatched_hidden_size() {
        let mut value: serde_json::Value =
            serde_json::from_str(&test_state_dict_json(2, 3, [0.0, 0.0])).unwrap();
        value["fc.0.weight"] = serde_json::json!(vec![vec![0.0; 5]; 3]);

        let err = LstmClassifier::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("fc.0.weight"));
    }

    #[test]
    fn test_rejects_gate_rows_not_multiple_of_four() {
        let mut value: serde_json::Value =
            serde_json::from_str(&test_state_dict_json(2, 3, [0.0, 0.0])).unwrap();
        value["lstm.weight_ih_l0"] = serde_json::json!(vec![vec![0.0; 4]; 7]);

        assert!(LstmClassifier::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_rejects_missing_parameter() {
        let mut value: serde_json::Value =
            serde_json::from_str(&test_state_dict_json(2, 3, [0.0, 0.0])).unwrap();
        value.as_object_mut().unwrap().remove("fc.3.bias");

        let err = LstmClassifier::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ComputeError::Startup(_)));
    }

    #[test]
    fn test_missing_weights_file_is_startup_error() {
        let err = LstmClassifier::from_path("/nonexistent/stress_lstm.json").unwrap_err();
        assert!(matches!(err, ComputeError::Startup(_)));
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0).is_finite());
        assert!(sigmoid(1000.0) <= 1.0);
    }
}
