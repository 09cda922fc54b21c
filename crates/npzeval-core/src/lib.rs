pub mod array;
pub mod artifact;
pub mod backend;
pub mod convert;
pub mod error;
pub mod spec;
pub mod tensor;

pub use array::{ArrayData, ArrayRecord, NamedArray, StorageOrder};
pub use artifact::*;
pub use backend::*;
pub use convert::convert_exact;
pub use error::*;
pub use spec::*;
pub use tensor::*;
