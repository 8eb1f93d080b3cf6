//! Backend and execution provider selection
//!
//! Providers are named `backend:provider` on the command line, e.g.
//! `onnx:cuda` or `tract:cpu`.

use crate::config::{BackendType, ExecutionProvider};
use crate::error::{Result, UpscaleError};

/// Availability of a backend/provider combination
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Parsing and discovery of execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse a `backend:provider` string
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// ```rust
    /// use imgly_upscale::utils::ExecutionProviderManager;
    /// use imgly_upscale::{BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda").unwrap();
    /// assert_eq!((backend, provider), (BackendType::Onnx, ExecutionProvider::Cuda));
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let Some((backend, provider)) = provider_str.split_once(':') else {
            return match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(UpscaleError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            };
        };

        match (backend, provider) {
            ("onnx", "auto") => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
            ("onnx", "cpu") => Ok((BackendType::Onnx, ExecutionProvider::Cpu)),
            ("onnx", "cuda") => Ok((BackendType::Onnx, ExecutionProvider::Cuda)),
            ("onnx", "coreml") => Ok((BackendType::Onnx, ExecutionProvider::CoreMl)),
            ("onnx", other) => Err(UpscaleError::invalid_config(format!(
                "Unknown ONNX provider: {other}. Supported: auto, cpu, cuda, coreml"
            ))),
            ("tract", "cpu") => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            ("tract", other) => Err(UpscaleError::invalid_config(format!(
                "Unknown Tract provider: {other}. Tract only supports 'cpu'"
            ))),
            (other, _) => Err(UpscaleError::invalid_config(format!(
                "Unknown backend: {other}. Supported backends: onnx, tract"
            ))),
        }
    }

    /// Every provider combination with its availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx: Vec<(String, bool, String)> = crate::backends::OnnxBackend::list_providers();
        #[cfg(not(feature = "onnx"))]
        let onnx: Vec<(String, bool, String)> = Vec::new();

        let onnx_available = |name: &str| {
            onnx.iter()
                .any(|(provider, available, _)| provider.eq_ignore_ascii_case(name) && *available)
        };
        let suffix = if cfg!(feature = "onnx") {
            ""
        } else {
            " (feature disabled)"
        };

        for (provider, description) in [
            (ExecutionProvider::Auto, "ONNX Runtime with auto-selected provider"),
            (ExecutionProvider::Cpu, "ONNX Runtime CPU execution"),
            (ExecutionProvider::Cuda, "ONNX Runtime CUDA GPU acceleration"),
            (ExecutionProvider::CoreMl, "ONNX Runtime CoreML (Apple Silicon) acceleration"),
        ] {
            let available = match provider {
                ExecutionProvider::Auto => onnx.iter().any(|(_, available, _)| *available),
                other => onnx_available(&other.to_string()),
            };
            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Onnx, provider),
                backend_type: BackendType::Onnx,
                execution_provider: provider,
                available,
                description: format!("{description}{suffix}"),
            });
        }

        #[cfg(feature = "tract")]
        for (name, available, description) in crate::backends::TractBackend::list_providers() {
            providers.push(ProviderInfo {
                name: format!("tract:{}", name.to_lowercase()),
                backend_type: BackendType::Tract,
                execution_provider: ExecutionProvider::Cpu,
                available,
                description,
            });
        }

        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference via Tract (feature disabled)".to_string(),
        });

        providers
    }

    /// Format a backend/provider pair as `backend:provider`
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{backend_type}:{provider}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onnx_providers() {
        for (input, expected) in [
            ("onnx:auto", ExecutionProvider::Auto),
            ("onnx:cpu", ExecutionProvider::Cpu),
            ("onnx:cuda", ExecutionProvider::Cuda),
            ("onnx:coreml", ExecutionProvider::CoreMl),
        ] {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected);
        }
    }

    #[test]
    fn test_parse_tract_and_bare_backends() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("onnx").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Auto)
        );
        assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ExecutionProviderManager::parse_provider_string("invalid").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("onnx:invalid").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("invalid:auto").is_err());
    }

    #[test]
    fn test_provider_to_string() {
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Onnx, ExecutionProvider::CoreMl),
            "onnx:coreml"
        );
    }

    #[test]
    fn test_list_all_providers() {
        let names: Vec<String> = ExecutionProviderManager::list_all_providers()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(names.contains(&"onnx:auto".to_string()));
        assert!(names.contains(&"onnx:cuda".to_string()));
        assert!(names.contains(&"tract:cpu".to_string()));
    }
}
