//! Decoding of `.npy` array streams and the `.npz` zip containers that
//! bundle them.

mod header;
pub mod npy;
pub mod npz;

pub use npy::{decode_array_stream, parse_descr, DATA_ALIGNMENT, MAGIC};
pub use npz::{Archive, ARRAY_SUFFIX};
