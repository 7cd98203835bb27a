use std::process::ExitCode;

use embert::{Result, SentenceTransformer};

fn main() -> Result<ExitCode> {
    let sentences = vec![
        "The cat sits outside",
        "A man is playing guitar",
        "I love pasta",
        "The new movie is awesome",
        "The cat plays in the garden",
        "A woman watches TV",
        "The new movie is so great",
        "Do you like pizza?",
        "The cat sits",
    ];

    let encoder =
        SentenceTransformer::from_repo_string("sentence-transformers/all-MiniLM-L6-v2")?;

    let embeddings = encoder.encode_batch(sentences.clone(), true)?;
    println!("Embeddings: {embeddings:?}");

    let (n_sentences, _) = embeddings.dims2()?;
    let mut similarities = Vec::with_capacity(n_sentences * (n_sentences - 1) / 2);

    for i in 0..n_sentences {
        let e_i = embeddings.get(i)?;
        for j in (i + 1)..n_sentences {
            let e_j = embeddings.get(j)?;
            // Embeddings are normalized, so the dot product is the cosine similarity.
            let cosine_similarity = (&e_i * &e_j)?.sum_all()?.to_scalar::<f32>()?;
            similarities.push((cosine_similarity, i, j));
        }
    }

    similarities.sort_by(|u, v| v.0.total_cmp(&u.0));
    for &(score, i, j) in similarities[..5].iter() {
        println!("score: {score:.2} '{}' '{}'", sentences[i], sentences[j]);
    }

    Ok(ExitCode::SUCCESS)
}
