use ultraviolet::f32x8;

/// Number of SIMD lanes used to store embedding parts internally
pub const EMBEDDING_LANES_SIZE: usize = 8;

/// Appearance embedding representation, packed into SIMD lanes. The tail is padded with zeros
pub type Embedding = Vec<f32x8>;

/// Utility trait to get conversion between embedding representations
///
pub trait FromVec<V, R> {
    fn from_vec(vec: V) -> R;
}

impl FromVec<&Embedding, Vec<f32>> for Vec<f32> {
    fn from_vec(vec: &Embedding) -> Vec<f32> {
        let mut res = Vec::with_capacity(vec.len() * EMBEDDING_LANES_SIZE);
        for e in vec {
            res.extend_from_slice(e.as_array_ref());
        }
        res
    }
}

/// Embedding from Vec<f32>
///
impl FromVec<Vec<f32>, Embedding> for Embedding {
    fn from_vec(vec: Vec<f32>) -> Embedding {
        Embedding::from_vec(vec.as_slice())
    }
}

/// Embedding from &[f32]
///
impl FromVec<&[f32], Embedding> for Embedding {
    fn from_vec(vec: &[f32]) -> Embedding {
        vec.chunks(EMBEDDING_LANES_SIZE)
            .map(|chunk| {
                let mut acc = [0.0; EMBEDDING_LANES_SIZE];
                acc[..chunk.len()].copy_from_slice(chunk);
                f32x8::new(acc)
            })
            .collect()
    }
}
