//! Shared helpers for tensor conversion, validation and provider selection

pub mod providers;
pub mod tensor;
pub mod validation;

pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use tensor::{chunk_to_tensor, tensor_to_chunk};
pub use validation::{ConfigValidator, TensorValidator};
