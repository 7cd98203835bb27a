use std::collections::HashMap;

use candle_core::Tensor;
use candle_onnx::onnx::tensor_proto::DataType;
use candle_onnx::onnx::TensorProto;

use crate::{Error, Result};

/// Weight tensors keyed by checkpoint name.
///
/// Checkpoints exported by `transformers` either use bare names
/// (`embeddings.word_embeddings.weight`) or prefix everything with the model
/// type (`bert.embeddings...`); lookups try both.
pub struct WeightMap {
    tensors: HashMap<String, Tensor>,
    prefix: &'static str,
}

impl WeightMap {
    pub fn new(tensors: HashMap<String, Tensor>) -> Self {
        let prefix = if tensors.contains_key("embeddings.word_embeddings.weight") {
            ""
        } else {
            "bert."
        };

        Self { tensors, prefix }
    }

    pub fn get(&self, name: &str) -> Result<&Tensor> {
        self.tensors
            .get(name)
            .or_else(|| self.tensors.get(&format!("{}{name}", self.prefix)))
            .ok_or_else(|| {
                Error::Export(format!(
                    "weight tensor `{name}` is missing from the checkpoint"
                ))
            })
    }
}

/// Raw-data FLOAT initializer from a candle tensor.
pub(crate) fn tensor_initializer(name: &str, tensor: &Tensor) -> Result<TensorProto> {
    let dims = tensor.dims().iter().map(|&d| d as i64).collect();
    let values = tensor.flatten_all()?.to_vec1::<f32>()?;

    Ok(TensorProto {
        name: name.to_string(),
        dims,
        data_type: DataType::Float as i32,
        raw_data: f32_raw(&values),
        ..Default::default()
    })
}

/// Initializer holding a linear layer's weight, transposed to input-major so
/// the graph can apply it with a plain MatMul.
pub(crate) fn linear_initializer(name: &str, tensor: &Tensor) -> Result<TensorProto> {
    tensor_initializer(name, &tensor.t()?.contiguous()?)
}

pub(crate) fn scalar_f32(name: &str, value: f32) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: vec![],
        data_type: DataType::Float as i32,
        raw_data: value.to_le_bytes().to_vec(),
        ..Default::default()
    }
}

pub(crate) fn vector_i64(name: &str, values: &[i64]) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: vec![values.len() as i64],
        data_type: DataType::Int64 as i32,
        raw_data: i64_raw(values),
        ..Default::default()
    }
}

fn f32_raw(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn i64_raw(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
