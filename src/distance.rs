use crate::utils::embedding::Embedding;

/// Cosine similarity between two embeddings
///
/// When the embedding lengths don't match, the longer one is truncated to
/// the shorter one when the similarity is calculated. A zero embedding has
/// no direction, so the similarity with it is `0.0`.
///
pub fn cosine(f1: &Embedding, f2: &Embedding) -> f32 {
    let mut divided = 0.0;
    let len = f1.len().min(f2.len());
    for i in 0..len {
        divided += (f1[i] * f2[i]).reduce_add();
    }

    let f1_divisor = f1
        .iter()
        .take(len)
        .fold(0.0_f32, |acc, a| acc + (*a * *a).reduce_add());

    let f2_divisor = f2
        .iter()
        .take(len)
        .fold(0.0_f32, |acc, a| acc + (*a * *a).reduce_add());

    let divisor = (f1_divisor * f2_divisor).sqrt();
    if divisor == 0.0 {
        0.0
    } else {
        divided / divisor
    }
}
