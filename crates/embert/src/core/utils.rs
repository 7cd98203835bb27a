use candle_core::Tensor;

use crate::{Error, Result};

/// L2-normalize a batch of embeddings along the embedding dimension.
pub fn normalize_l2(v: &Tensor) -> Result<Tensor> {
    let norm = v.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    Ok(v.broadcast_div(&norm)?)
}

/// Split a `repo[:revision]` string. The revision defaults to `main`.
pub fn parse_repo_string(repo_string: &str) -> Result<(&str, &str)> {
    if repo_string.is_empty() {
        return Err(Error::InvalidModelRepo(
            "model repository string is empty".to_string(),
        ));
    }

    const ILLEGAL_CHARS: [char; 6] = ['\\', '<', '>', '|', '?', '*'];
    if repo_string.chars().any(|c| ILLEGAL_CHARS.contains(&c)) {
        return Err(Error::InvalidModelRepo(format!(
            "model repository string `{repo_string}` contains illegal characters"
        )));
    }

    let mut parts = repo_string.splitn(2, ':');
    let repo_id = parts.next().unwrap_or_default();
    let revision = match parts.next() {
        None | Some("") => "main",
        Some(revision) => revision,
    };

    Ok((repo_id, revision))
}

/// First `n` components of an embedding, for display.
pub fn embedding_head(embedding: &[f32], n: usize) -> &[f32] {
    &embedding[..embedding.len().min(n)]
}
