//! End-to-end export over a synthetic checkpoint: a miniature BERT repository
//! is written to disk, exported, and the artifact is read back and checked
//! against the declared interface.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_onnx::onnx::tensor_shape_proto::dimension;
use candle_onnx::onnx::type_proto;
use candle_onnx::onnx::ValueInfoProto;

use embert::export::{export_onnx, ATTENTION_MASK, INPUT_IDS, OPSET_VERSION, SENTENCE_EMBEDDING};
use embert::ModelRepo;

const HIDDEN: usize = 8;
const INTERMEDIATE: usize = 16;
const LAYERS: usize = 2;
const VOCAB: usize = 16;
const MAX_POSITIONS: usize = 256;

const CONFIG_JSON: &str = r#"
{
    "architectures": ["BertModel"],
    "attention_probs_dropout_prob": 0.1,
    "classifier_dropout": null,
    "hidden_act": "gelu",
    "hidden_dropout_prob": 0.1,
    "hidden_size": 8,
    "initializer_range": 0.02,
    "intermediate_size": 16,
    "layer_norm_eps": 1e-12,
    "max_position_embeddings": 256,
    "model_type": "bert",
    "num_attention_heads": 2,
    "num_hidden_layers": 2,
    "pad_token_id": 0,
    "position_embedding_type": "absolute",
    "type_vocab_size": 2,
    "use_cache": true,
    "vocab_size": 16
}
"#;

const TOKENIZER_JSON: &str = r###"
{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": { "type": "Lowercase" },
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordPiece",
        "unk_token": "[UNK]",
        "continuing_subword_prefix": "##",
        "max_input_chars_per_word": 100,
        "vocab": {
            "[PAD]": 0,
            "[UNK]": 1,
            "[CLS]": 2,
            "[SEP]": 3,
            "this": 4,
            "is": 5,
            "a": 6,
            "dummy": 7,
            "input": 8
        }
    }
}
"###;

const POOLING_JSON: &str = r#"
{
    "word_embedding_dimension": 8,
    "pooling_mode_cls_token": false,
    "pooling_mode_mean_tokens": true,
    "pooling_mode_max_tokens": false,
    "pooling_mode_mean_sqrt_len_tokens": false
}
"#;

fn write_checkpoint(root: &Path) -> Result<()> {
    let device = Device::Cpu;
    let mut tensors: HashMap<String, Tensor> = HashMap::new();

    let mut zeros = |name: String, dims: &[usize]| -> candle_core::Result<()> {
        tensors.insert(name, Tensor::zeros(dims, DType::F32, &device)?);
        Ok(())
    };

    zeros("embeddings.word_embeddings.weight".to_string(), &[VOCAB, HIDDEN])?;
    zeros(
        "embeddings.position_embeddings.weight".to_string(),
        &[MAX_POSITIONS, HIDDEN],
    )?;
    zeros("embeddings.token_type_embeddings.weight".to_string(), &[2, HIDDEN])?;
    zeros("embeddings.LayerNorm.weight".to_string(), &[HIDDEN])?;
    zeros("embeddings.LayerNorm.bias".to_string(), &[HIDDEN])?;

    for index in 0..LAYERS {
        let p = format!("encoder.layer.{index}");

        for proj in ["query", "key", "value"] {
            zeros(format!("{p}.attention.self.{proj}.weight"), &[HIDDEN, HIDDEN])?;
            zeros(format!("{p}.attention.self.{proj}.bias"), &[HIDDEN])?;
        }
        zeros(format!("{p}.attention.output.dense.weight"), &[HIDDEN, HIDDEN])?;
        zeros(format!("{p}.attention.output.dense.bias"), &[HIDDEN])?;
        zeros(format!("{p}.attention.output.LayerNorm.weight"), &[HIDDEN])?;
        zeros(format!("{p}.attention.output.LayerNorm.bias"), &[HIDDEN])?;
        zeros(format!("{p}.intermediate.dense.weight"), &[INTERMEDIATE, HIDDEN])?;
        zeros(format!("{p}.intermediate.dense.bias"), &[INTERMEDIATE])?;
        zeros(format!("{p}.output.dense.weight"), &[HIDDEN, INTERMEDIATE])?;
        zeros(format!("{p}.output.dense.bias"), &[HIDDEN])?;
        zeros(format!("{p}.output.LayerNorm.weight"), &[HIDDEN])?;
        zeros(format!("{p}.output.LayerNorm.bias"), &[HIDDEN])?;
    }

    candle_core::safetensors::save(&tensors, root.join("model.safetensors"))?;

    fs::write(root.join("config.json"), CONFIG_JSON)?;
    fs::write(root.join("tokenizer.json"), TOKENIZER_JSON)?;
    let pooling_path = root.join("1_Pooling/config.json");
    fs::create_dir_all(pooling_path.parent().unwrap())?;
    fs::write(pooling_path, POOLING_JSON)?;

    Ok(())
}

fn dim_params(info: &ValueInfoProto) -> Vec<String> {
    let Some(type_proto::Value::TensorType(tensor)) =
        info.r#type.as_ref().and_then(|t| t.value.as_ref())
    else {
        panic!("expected a tensor type for {}", info.name);
    };

    tensor
        .shape
        .as_ref()
        .expect("shape should be declared")
        .dim
        .iter()
        .map(|d| match d.value.as_ref().expect("dimension should be set") {
            dimension::Value::DimParam(p) => p.clone(),
            dimension::Value::DimValue(v) => v.to_string(),
        })
        .collect()
}

#[test]
fn test_export_declares_dynamic_interface() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_checkpoint(dir.path())?;

    let repo = ModelRepo::from_path(dir.path());
    let output = dir.path().join("sentence_transformer.onnx");

    let report = export_onnx(&repo, &output)?;
    assert!(output.exists());
    assert_eq!(report.bytes as u64, fs::metadata(&output)?.len());
    assert!(report.nodes > 0);
    assert!(report.initializers > 0);

    let model = candle_onnx::read_file(&output)?;
    assert_eq!(model.opset_import[0].version, OPSET_VERSION);

    let graph = model.graph.expect("artifact should contain a graph");

    let input_names: Vec<_> = graph.input.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(input_names, [INPUT_IDS, ATTENTION_MASK]);
    for input in &graph.input {
        assert_eq!(dim_params(input), ["batch_size", "sequence_length"]);
    }

    assert_eq!(graph.output.len(), 1);
    assert_eq!(graph.output[0].name, SENTENCE_EMBEDDING);
    assert_eq!(
        dim_params(&graph.output[0]),
        ["batch_size".to_string(), HIDDEN.to_string()]
    );

    Ok(())
}

#[test]
fn test_export_is_deterministic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_checkpoint(dir.path())?;

    let repo = ModelRepo::from_path(dir.path());
    let first = dir.path().join("first.onnx");
    let second = dir.path().join("second.onnx");

    export_onnx(&repo, &first)?;
    export_onnx(&repo, &second)?;

    assert_eq!(fs::read(&first)?, fs::read(&second)?);

    Ok(())
}

#[test]
#[ignore = "downloads model weights from the HF Hub"]
fn test_export_all_minilm_l6_v2() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let repo = ModelRepo::from_repo_string("sentence-transformers/all-MiniLM-L6-v2")?;
    let output = dir.path().join("sentence_transformer.onnx");

    export_onnx(&repo, &output)?;

    let model = candle_onnx::read_file(&output)?;
    let graph = model.graph.expect("artifact should contain a graph");
    assert_eq!(graph.output[0].name, SENTENCE_EMBEDDING);
    assert_eq!(dim_params(&graph.output[0]), ["batch_size", "384"]);

    Ok(())
}
