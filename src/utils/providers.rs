//! Execution provider parsing and discovery

use crate::{
    config::ExecutionProvider,
    error::{FaceBlurError, Result},
    processor::BackendType,
};

/// Information about a `backend:provider` combination
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in `backend:provider` form
    ///
    /// A bare backend name selects its default provider.
    ///
    /// # Examples
    /// ```rust
    /// use faceblur::utils::ExecutionProviderManager;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:auto")?;
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract:cpu")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider name
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = match provider_str.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (provider_str, None),
        };

        match (backend, provider) {
            ("onnx", None) => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
            ("onnx", Some(provider)) => {
                let execution_provider = match provider {
                    "auto" => ExecutionProvider::Auto,
                    "cpu" => ExecutionProvider::Cpu,
                    "cuda" => ExecutionProvider::Cuda,
                    "coreml" => ExecutionProvider::CoreMl,
                    _ => {
                        return Err(FaceBlurError::invalid_config(format!(
                            "Unknown ONNX provider: {provider}. Supported: auto, cpu, cuda, coreml"
                        )))
                    },
                };
                Ok((BackendType::Onnx, execution_provider))
            },
            ("tract", None | Some("cpu")) => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            ("tract", Some(provider)) => Err(FaceBlurError::invalid_config(format!(
                "Unknown Tract provider: {provider}. Tract only supports 'cpu'"
            ))),
            (backend, _) => Err(FaceBlurError::invalid_config(format!(
                "Unknown backend: {backend}. Use backend:provider (e.g., onnx:auto, tract:cpu)"
            ))),
        }
    }

    /// All provider combinations with their availability on this machine
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        {
            use crate::backends::OnnxBackend;
            let availability: std::collections::HashMap<String, bool> = OnnxBackend::list_providers()
                .into_iter()
                .map(|(name, available, _)| (name.to_lowercase(), available))
                .collect();
            let lookup = |name: &str| availability.get(name).copied().unwrap_or(false);

            for (provider, available, description) in [
                (ExecutionProvider::Auto, true, "ONNX Runtime with auto-selected provider"),
                (ExecutionProvider::Cpu, lookup("cpu"), "ONNX Runtime CPU execution"),
                (ExecutionProvider::Cuda, lookup("cuda"), "ONNX Runtime CUDA GPU acceleration"),
                (
                    ExecutionProvider::CoreMl,
                    lookup("coreml"),
                    "ONNX Runtime CoreML (Apple Silicon) acceleration",
                ),
            ] {
                providers.push(ProviderInfo {
                    name: format!("onnx:{provider}"),
                    backend_type: BackendType::Onnx,
                    execution_provider: provider,
                    available,
                    description: description.to_string(),
                });
            }
        }

        #[cfg(not(feature = "onnx"))]
        providers.push(ProviderInfo {
            name: "onnx:auto".to_string(),
            backend_type: BackendType::Onnx,
            execution_provider: ExecutionProvider::Auto,
            available: false,
            description: "ONNX Runtime (feature disabled)".to_string(),
        });

        #[cfg(feature = "tract")]
        {
            use crate::backends::TractBackend;
            for (name, available, description) in TractBackend::list_providers() {
                providers.push(ProviderInfo {
                    name: format!("tract:{}", name.to_lowercase()),
                    backend_type: BackendType::Tract,
                    execution_provider: ExecutionProvider::Cpu,
                    available,
                    description,
                });
            }
        }

        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference (feature disabled)".to_string(),
        });

        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onnx_providers() {
        let cases = [
            ("onnx:auto", ExecutionProvider::Auto),
            ("onnx:cpu", ExecutionProvider::Cpu),
            ("onnx:cuda", ExecutionProvider::Cuda),
            ("onnx:coreml", ExecutionProvider::CoreMl),
            ("onnx", ExecutionProvider::Auto),
        ];
        for (input, expected) in cases {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected, "{input}");
        }
    }

    #[test]
    fn test_parse_tract_providers() {
        for input in ["tract", "tract:cpu"] {
            assert_eq!(
                ExecutionProviderManager::parse_provider_string(input).unwrap(),
                (BackendType::Tract, ExecutionProvider::Cpu)
            );
        }
        assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
    }

    #[test]
    fn test_parse_invalid_strings() {
        for input in ["", "gpu", "onnx:tpu", "opencv:cpu", ":cpu"] {
            assert!(
                matches!(
                    ExecutionProviderManager::parse_provider_string(input),
                    Err(FaceBlurError::InvalidConfig(_))
                ),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_listed_providers_parse_back() {
        let providers = ExecutionProviderManager::list_all_providers();
        assert!(!providers.is_empty());
        for info in providers {
            let (backend, provider) = ExecutionProviderManager::parse_provider_string(&info.name).unwrap();
            assert_eq!(backend, info.backend_type);
            assert_eq!(provider, info.execution_provider);
        }
    }
}
