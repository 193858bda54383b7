//! IO helpers for csrmm: the binary codec shared by both matrix stores

pub mod codec;

pub use codec::{
    decode_csr, decode_dense, decode_dense_into, encode_csr, encode_dense, BinaryCodec,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
