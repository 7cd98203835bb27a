//! Synthetic checkpoints for exercising the graph builder without real
//! weights.

use std::collections::HashMap;

use candle_core::{DType, Device, Tensor};

use super::config::BertOnnxConfig;
use super::weights::WeightMap;
use crate::Result;

pub(crate) fn tiny_config() -> BertOnnxConfig {
    BertOnnxConfig {
        vocab_size: 16,
        hidden_size: 8,
        num_hidden_layers: 2,
        num_attention_heads: 2,
        intermediate_size: 16,
        max_position_embeddings: 256,
        layer_norm_eps: 1e-12,
        hidden_act: "gelu".to_string(),
    }
}

fn zeros(
    tensors: &mut HashMap<String, Tensor>,
    name: String,
    dims: &[usize],
    device: &Device,
) -> Result<()> {
    tensors.insert(name, Tensor::zeros(dims, DType::F32, device)?);
    Ok(())
}

fn ones(
    tensors: &mut HashMap<String, Tensor>,
    name: String,
    dims: &[usize],
    device: &Device,
) -> Result<()> {
    tensors.insert(name, Tensor::ones(dims, DType::F32, device)?);
    Ok(())
}

/// All tensors a BERT checkpoint of the given dimensions carries, zeroed
/// except for LayerNorm scales.
pub(crate) fn tiny_tensors(cfg: &BertOnnxConfig) -> Result<HashMap<String, Tensor>> {
    let device = Device::Cpu;
    let hidden = cfg.hidden_size;
    let mut tensors = HashMap::new();
    let t = &mut tensors;

    zeros(
        t,
        "embeddings.word_embeddings.weight".to_string(),
        &[cfg.vocab_size, hidden],
        &device,
    )?;
    zeros(
        t,
        "embeddings.position_embeddings.weight".to_string(),
        &[cfg.max_position_embeddings, hidden],
        &device,
    )?;
    zeros(
        t,
        "embeddings.token_type_embeddings.weight".to_string(),
        &[2, hidden],
        &device,
    )?;
    ones(t, "embeddings.LayerNorm.weight".to_string(), &[hidden], &device)?;
    zeros(t, "embeddings.LayerNorm.bias".to_string(), &[hidden], &device)?;

    for index in 0..cfg.num_hidden_layers {
        let p = format!("encoder.layer.{index}");

        for proj in ["query", "key", "value"] {
            zeros(
                t,
                format!("{p}.attention.self.{proj}.weight"),
                &[hidden, hidden],
                &device,
            )?;
            zeros(t, format!("{p}.attention.self.{proj}.bias"), &[hidden], &device)?;
        }

        zeros(
            t,
            format!("{p}.attention.output.dense.weight"),
            &[hidden, hidden],
            &device,
        )?;
        zeros(t, format!("{p}.attention.output.dense.bias"), &[hidden], &device)?;
        ones(
            t,
            format!("{p}.attention.output.LayerNorm.weight"),
            &[hidden],
            &device,
        )?;
        zeros(
            t,
            format!("{p}.attention.output.LayerNorm.bias"),
            &[hidden],
            &device,
        )?;

        zeros(
            t,
            format!("{p}.intermediate.dense.weight"),
            &[cfg.intermediate_size, hidden],
            &device,
        )?;
        zeros(
            t,
            format!("{p}.intermediate.dense.bias"),
            &[cfg.intermediate_size],
            &device,
        )?;
        zeros(
            t,
            format!("{p}.output.dense.weight"),
            &[hidden, cfg.intermediate_size],
            &device,
        )?;
        zeros(t, format!("{p}.output.dense.bias"), &[hidden], &device)?;
        ones(t, format!("{p}.output.LayerNorm.weight"), &[hidden], &device)?;
        zeros(t, format!("{p}.output.LayerNorm.bias"), &[hidden], &device)?;
    }

    Ok(tensors)
}

pub(crate) fn tiny_weights(cfg: &BertOnnxConfig) -> Result<WeightMap> {
    Ok(WeightMap::new(tiny_tensors(cfg)?))
}
