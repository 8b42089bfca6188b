/// Bounding boxes
pub mod bbox;

/// SIMD lane packing of embedding vectors
pub mod embedding;
