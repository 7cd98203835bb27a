//! Deterministic ONNX graph construction for BERT-family sentence encoders.
//!
//! The emitted graph computes the whole sentence-embedding pipeline: token,
//! position and token-type embeddings, the transformer stack, masked mean
//! pooling, and L2 normalization. Opset 14 has neither `LayerNormalization`
//! nor `Gelu`, so both are emitted as primitive-op subgraphs. Sequence length
//! is recovered from `Shape(input_ids)` at runtime, which is what lets one
//! artifact serve any batch size and sequence length.

use candle_onnx::onnx::attribute_proto::AttributeType;
use candle_onnx::onnx::tensor_proto::DataType;
use candle_onnx::onnx::tensor_shape_proto::{dimension, Dimension};
use candle_onnx::onnx::type_proto;
use candle_onnx::onnx::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};

use super::config::BertOnnxConfig;
use super::weights::{self, WeightMap};
use crate::Result;

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";
pub const SENTENCE_EMBEDDING: &str = "sentence_embedding";
pub const BATCH_DIM: &str = "batch_size";
pub const SEQUENCE_DIM: &str = "sequence_length";
pub const OPSET_VERSION: i64 = 14;

const IR_VERSION: i64 = 7;

/// Additive penalty applied to masked-out attention scores.
const MASK_PENALTY: f32 = -10_000.0;
/// Lower bound on the pooling divisor, guarding against all-padding rows.
const MASK_DENOM_MIN: f32 = 1e-9;
/// Lower bound on the L2 norm before the final division.
const NORM_MIN: f32 = 1e-12;

// Names of the non-weight constant initializers.
const ONE: &str = "const.one";
const HALF: &str = "const.half";
const SQRT_TWO: &str = "const.sqrt_two";
const LN_EPS: &str = "const.ln_eps";
const ATTN_SCALE: &str = "const.attn_scale";
const MASK_PENALTY_C: &str = "const.mask_penalty";
const MASK_DENOM_MIN_C: &str = "const.mask_denom_min";
const NORM_MIN_C: &str = "const.norm_min";
const ZERO_1D: &str = "const.zero_1d";
const ONE_1D: &str = "const.one_1d";
const TWO_1D: &str = "const.two_1d";
const MASK_AXES: &str = "const.mask_axes";
const TOKEN_AXES: &str = "const.token_axes";
const REDUCE_AXIS: &str = "const.reduce_axis";
const SPLIT_HEADS_SHAPE: &str = "const.split_heads_shape";
const MERGE_HEADS_SHAPE: &str = "const.merge_heads_shape";

const WORD_EMBEDDINGS: &str = "embeddings.word_embeddings.weight";
const POSITION_EMBEDDINGS: &str = "embeddings.position_embeddings.weight";
const TOKEN_TYPE_EMBEDDINGS: &str = "embeddings.token_type_embeddings.weight";
const TOKEN_TYPE_BIAS: &str = "embeddings.token_type_bias";

fn attr_int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

fn attr_ints(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Ints as i32,
        ints: values.to_vec(),
        ..Default::default()
    }
}

enum Dim {
    Fixed(i64),
    Symbolic(&'static str),
}

fn tensor_value_info(name: &str, elem_type: DataType, dims: &[Dim]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| Dimension {
            value: Some(match d {
                Dim::Fixed(v) => dimension::Value::DimValue(*v),
                Dim::Symbolic(s) => dimension::Value::DimParam((*s).to_string()),
            }),
            ..Default::default()
        })
        .collect();

    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: elem_type as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

struct GraphBuilder<'w> {
    cfg: &'w BertOnnxConfig,
    weights: &'w WeightMap,
    nodes: Vec<NodeProto>,
    initializers: Vec<TensorProto>,
}

impl GraphBuilder<'_> {
    fn node(&mut self, op_type: &str, inputs: &[&str], output: &str) -> String {
        self.node_with(op_type, inputs, output, vec![])
    }

    fn node_with(
        &mut self,
        op_type: &str,
        inputs: &[&str],
        output: &str,
        attributes: Vec<AttributeProto>,
    ) -> String {
        self.nodes.push(NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: vec![output.to_string()],
            name: output.to_string(),
            op_type: op_type.to_string(),
            attribute: attributes,
            ..Default::default()
        });

        output.to_string()
    }

    /// Registers the constant initializers shared across the graph.
    fn constants(&mut self) {
        let heads = self.cfg.num_attention_heads as i64;
        let head_dim = self.cfg.head_dim() as i64;

        self.initializers.push(weights::scalar_f32(ONE, 1.0));
        self.initializers.push(weights::scalar_f32(HALF, 0.5));
        self.initializers
            .push(weights::scalar_f32(SQRT_TWO, std::f32::consts::SQRT_2));
        self.initializers
            .push(weights::scalar_f32(LN_EPS, self.cfg.layer_norm_eps as f32));
        self.initializers
            .push(weights::scalar_f32(ATTN_SCALE, (head_dim as f32).sqrt()));
        self.initializers
            .push(weights::scalar_f32(MASK_PENALTY_C, MASK_PENALTY));
        self.initializers
            .push(weights::scalar_f32(MASK_DENOM_MIN_C, MASK_DENOM_MIN));
        self.initializers
            .push(weights::scalar_f32(NORM_MIN_C, NORM_MIN));

        self.initializers.push(weights::vector_i64(ZERO_1D, &[0]));
        self.initializers.push(weights::vector_i64(ONE_1D, &[1]));
        self.initializers.push(weights::vector_i64(TWO_1D, &[2]));
        self.initializers
            .push(weights::vector_i64(MASK_AXES, &[1, 2]));
        self.initializers.push(weights::vector_i64(TOKEN_AXES, &[2]));
        self.initializers
            .push(weights::vector_i64(REDUCE_AXIS, &[1]));
        self.initializers
            .push(weights::vector_i64(SPLIT_HEADS_SHAPE, &[0, 0, heads, head_dim]));
        self.initializers
            .push(weights::vector_i64(MERGE_HEADS_SHAPE, &[0, 0, -1]));
    }

    /// `y = x · Wᵀ + b` as MatMul + Add over `[batch, seq, *]` activations.
    /// Registers the transposed weight and the bias as initializers.
    fn linear(&mut self, x: &str, param: &str, output: &str) -> Result<String> {
        let weight = format!("{param}.weight");
        let bias = format!("{param}.bias");

        let weight_init = weights::linear_initializer(&weight, self.weights.get(&weight)?)?;
        self.initializers.push(weight_init);
        let bias_init = weights::tensor_initializer(&bias, self.weights.get(&bias)?)?;
        self.initializers.push(bias_init);

        let matmul = self.node("MatMul", &[x, &weight], &format!("{output}.matmul"));
        Ok(self.node("Add", &[&matmul, &bias], output))
    }

    /// LayerNormalization over the last axis, decomposed into primitive ops.
    fn layer_norm(&mut self, x: &str, param: &str, output: &str) -> Result<String> {
        let gamma = format!("{param}.weight");
        let beta = format!("{param}.bias");

        let gamma_init = weights::tensor_initializer(&gamma, self.weights.get(&gamma)?)?;
        self.initializers.push(gamma_init);
        let beta_init = weights::tensor_initializer(&beta, self.weights.get(&beta)?)?;
        self.initializers.push(beta_init);

        let reduce_attrs = || vec![attr_ints("axes", &[-1]), attr_int("keepdims", 1)];

        let mean = self.node_with("ReduceMean", &[x], &format!("{output}.mean"), reduce_attrs());
        let centered = self.node("Sub", &[x, &mean], &format!("{output}.centered"));
        let squared = self.node("Mul", &[&centered, &centered], &format!("{output}.squared"));
        let variance = self.node_with(
            "ReduceMean",
            &[&squared],
            &format!("{output}.variance"),
            reduce_attrs(),
        );
        let shifted = self.node("Add", &[&variance, LN_EPS], &format!("{output}.shifted"));
        let std = self.node("Sqrt", &[&shifted], &format!("{output}.std"));
        let normed = self.node("Div", &[&centered, &std], &format!("{output}.normed"));
        let scaled = self.node("Mul", &[&normed, &gamma], &format!("{output}.scaled"));
        Ok(self.node("Add", &[&scaled, &beta], output))
    }

    /// Exact gelu: `0.5 · x · (1 + erf(x / √2))`.
    fn gelu(&mut self, x: &str, output: &str) -> String {
        let scaled = self.node("Div", &[x, SQRT_TWO], &format!("{output}.scaled"));
        let erf = self.node("Erf", &[&scaled], &format!("{output}.erf"));
        let shifted = self.node("Add", &[&erf, ONE], &format!("{output}.shifted"));
        let gated = self.node("Mul", &[x, &shifted], &format!("{output}.gated"));
        self.node("Mul", &[&gated, HALF], output)
    }

    /// Float mask `[batch, seq]` and the additive attention bias
    /// `[batch, 1, 1, seq]` derived from it.
    fn attention_mask_bias(&mut self) -> (String, String) {
        let mask_f = self.node_with(
            "Cast",
            &[ATTENTION_MASK],
            "mask.float",
            vec![attr_int("to", DataType::Float as i64)],
        );
        let expanded = self.node("Unsqueeze", &[&mask_f, MASK_AXES], "mask.expanded");
        let inverted = self.node("Sub", &[ONE, &expanded], "mask.inverted");
        let bias = self.node("Mul", &[&inverted, MASK_PENALTY_C], "mask.bias");

        (mask_f, bias)
    }

    /// Embedding lookup: word + position + token-type, followed by LayerNorm.
    ///
    /// Position embeddings are sliced to the runtime sequence length taken
    /// from `Shape(input_ids)`. Token type ids are identically zero for
    /// single-segment sentence input, so the type-0 row is folded into a
    /// constant bias instead of declaring a third graph input.
    fn embeddings(&mut self) -> Result<String> {
        let word_init =
            weights::tensor_initializer(WORD_EMBEDDINGS, self.weights.get(WORD_EMBEDDINGS)?)?;
        self.initializers.push(word_init);
        let position_init = weights::tensor_initializer(
            POSITION_EMBEDDINGS,
            self.weights.get(POSITION_EMBEDDINGS)?,
        )?;
        self.initializers.push(position_init);
        let type_row = self.weights.get(TOKEN_TYPE_EMBEDDINGS)?.get(0)?;
        let type_init = weights::tensor_initializer(TOKEN_TYPE_BIAS, &type_row)?;
        self.initializers.push(type_init);

        let token = self.node("Gather", &[WORD_EMBEDDINGS, INPUT_IDS], "embeddings.token");

        let ids_shape = self.node("Shape", &[INPUT_IDS], "embeddings.ids_shape");
        let seq_len = self.node(
            "Slice",
            &[&ids_shape, ONE_1D, TWO_1D, ZERO_1D],
            "embeddings.seq_len",
        );
        let position = self.node(
            "Slice",
            &[POSITION_EMBEDDINGS, ZERO_1D, &seq_len, ZERO_1D],
            "embeddings.position",
        );

        let token_position = self.node("Add", &[&token, &position], "embeddings.token_position");
        let summed = self.node("Add", &[&token_position, TOKEN_TYPE_BIAS], "embeddings.sum");

        self.layer_norm(&summed, "embeddings.LayerNorm", "embeddings.out")
    }

    /// `[batch, seq, hidden]` → `[batch, heads, seq, head_dim]`.
    fn split_heads(&mut self, x: &str, output: &str) -> String {
        let reshaped = self.node(
            "Reshape",
            &[x, SPLIT_HEADS_SHAPE],
            &format!("{output}.reshaped"),
        );
        self.node_with(
            "Transpose",
            &[&reshaped],
            output,
            vec![attr_ints("perm", &[0, 2, 1, 3])],
        )
    }

    fn encoder_layer(&mut self, index: usize, x: &str, mask_bias: &str) -> Result<String> {
        let p = format!("encoder.layer.{index}");

        let query = self.linear(x, &format!("{p}.attention.self.query"), &format!("{p}.attn.q"))?;
        let key = self.linear(x, &format!("{p}.attention.self.key"), &format!("{p}.attn.k"))?;
        let value = self.linear(x, &format!("{p}.attention.self.value"), &format!("{p}.attn.v"))?;

        let query_heads = self.split_heads(&query, &format!("{p}.attn.q_heads"));
        let key_heads = self.split_heads(&key, &format!("{p}.attn.k_heads"));
        let value_heads = self.split_heads(&value, &format!("{p}.attn.v_heads"));

        let key_t = self.node_with(
            "Transpose",
            &[&key_heads],
            &format!("{p}.attn.k_t"),
            vec![attr_ints("perm", &[0, 1, 3, 2])],
        );
        let scores = self.node("MatMul", &[&query_heads, &key_t], &format!("{p}.attn.scores"));
        let scaled = self.node("Div", &[&scores, ATTN_SCALE], &format!("{p}.attn.scaled"));
        let masked = self.node("Add", &[&scaled, mask_bias], &format!("{p}.attn.masked"));
        let probs = self.node_with(
            "Softmax",
            &[&masked],
            &format!("{p}.attn.probs"),
            vec![attr_int("axis", -1)],
        );

        let context = self.node("MatMul", &[&probs, &value_heads], &format!("{p}.attn.context"));
        let context_t = self.node_with(
            "Transpose",
            &[&context],
            &format!("{p}.attn.context_t"),
            vec![attr_ints("perm", &[0, 2, 1, 3])],
        );
        let merged = self.node(
            "Reshape",
            &[&context_t, MERGE_HEADS_SHAPE],
            &format!("{p}.attn.merged"),
        );

        let attn_out = self.linear(
            &merged,
            &format!("{p}.attention.output.dense"),
            &format!("{p}.attn.out"),
        )?;
        let residual = self.node("Add", &[&attn_out, x], &format!("{p}.attn.residual"));
        let attn_normed = self.layer_norm(
            &residual,
            &format!("{p}.attention.output.LayerNorm"),
            &format!("{p}.attn.ln"),
        )?;

        let intermediate = self.linear(
            &attn_normed,
            &format!("{p}.intermediate.dense"),
            &format!("{p}.ffn.intermediate"),
        )?;
        let activated = self.gelu(&intermediate, &format!("{p}.ffn.act"));
        let ffn_out = self.linear(&activated, &format!("{p}.output.dense"), &format!("{p}.ffn.out"))?;
        let ffn_residual = self.node("Add", &[&ffn_out, &attn_normed], &format!("{p}.ffn.residual"));

        self.layer_norm(&ffn_residual, &format!("{p}.output.LayerNorm"), &format!("{p}.out"))
    }

    /// Attention-mask-aware mean pooling over the token axis.
    fn pooling(&mut self, hidden: &str, mask_f: &str) -> String {
        let mask = self.node("Unsqueeze", &[mask_f, TOKEN_AXES], "pooling.mask");
        let weighted = self.node("Mul", &[hidden, &mask], "pooling.weighted");
        let summed = self.node_with(
            "ReduceSum",
            &[&weighted, REDUCE_AXIS],
            "pooling.sum",
            vec![attr_int("keepdims", 0)],
        );
        let counts = self.node_with(
            "ReduceSum",
            &[&mask, REDUCE_AXIS],
            "pooling.counts",
            vec![attr_int("keepdims", 0)],
        );
        let clamped = self.node("Clip", &[&counts, MASK_DENOM_MIN_C], "pooling.counts_clamped");
        self.node("Div", &[&summed, &clamped], "pooling.mean")
    }

    /// L2 normalization producing the single declared graph output.
    fn normalize(&mut self, x: &str) -> String {
        let norm = self.node_with(
            "ReduceL2",
            &[x],
            "normalize.norm",
            vec![attr_ints("axes", &[-1]), attr_int("keepdims", 1)],
        );
        let clamped = self.node("Clip", &[&norm, NORM_MIN_C], "normalize.norm_clamped");
        self.node("Div", &[x, &clamped], SENTENCE_EMBEDDING)
    }
}

pub(crate) fn build_graph(cfg: &BertOnnxConfig, weights: &WeightMap) -> Result<GraphProto> {
    let mut builder = GraphBuilder {
        cfg,
        weights,
        nodes: vec![],
        initializers: vec![],
    };

    builder.constants();
    let (mask_f, mask_bias) = builder.attention_mask_bias();

    let mut hidden = builder.embeddings()?;
    for index in 0..cfg.num_hidden_layers {
        hidden = builder.encoder_layer(index, &hidden, &mask_bias)?;
    }

    let pooled = builder.pooling(&hidden, &mask_f);
    builder.normalize(&pooled);

    Ok(GraphProto {
        node: builder.nodes,
        name: "sentence_transformer".to_string(),
        initializer: builder.initializers,
        input: vec![
            tensor_value_info(
                INPUT_IDS,
                DataType::Int64,
                &[Dim::Symbolic(BATCH_DIM), Dim::Symbolic(SEQUENCE_DIM)],
            ),
            tensor_value_info(
                ATTENTION_MASK,
                DataType::Int64,
                &[Dim::Symbolic(BATCH_DIM), Dim::Symbolic(SEQUENCE_DIM)],
            ),
        ],
        output: vec![tensor_value_info(
            SENTENCE_EMBEDDING,
            DataType::Float,
            &[Dim::Symbolic(BATCH_DIM), Dim::Fixed(cfg.hidden_size as i64)],
        )],
        ..Default::default()
    })
}

pub fn build_model(cfg: &BertOnnxConfig, weights: &WeightMap) -> Result<ModelProto> {
    let graph = build_graph(cfg, weights)?;

    Ok(ModelProto {
        ir_version: IR_VERSION,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: OPSET_VERSION,
        }],
        producer_name: env!("CARGO_PKG_NAME").to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        graph: Some(graph),
        ..Default::default()
    })
}
