// Embeddings and vector search

pub mod client;
pub mod vector_search;

pub use client::*;
pub use vector_search::*;
