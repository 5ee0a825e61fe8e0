//! GLSL and HLSL compilation to SPIR-V.
//!
//! [`ShaderLoader`] wraps a `shaderc` compiler configured for the Vulkan
//! version of the context. Every entry point produces a [`ShaderStageInfo`]
//! ready to be handed to [`Shader::new`](crate::shader::Shader::new).

use std::path::Path;

use shaderc::{CompileOptions, Compiler, EnvVersion, ShaderKind, SourceLanguage, SpirvVersion, TargetEnv};

use crate::{
    shader::{ShaderStage, ShaderStageInfo},
    utils::Version,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderLanguage {
    #[default]
    Glsl,
    Hlsl,
}

impl From<ShaderLanguage> for SourceLanguage {
    fn from(language: ShaderLanguage) -> Self {
        match language {
            ShaderLanguage::Glsl => SourceLanguage::GLSL,
            ShaderLanguage::Hlsl => SourceLanguage::HLSL,
        }
    }
}

impl From<ShaderStage> for ShaderKind {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderKind::Vertex,
            ShaderStage::TessellationControl => ShaderKind::TessControl,
            ShaderStage::TessellationEvaluation => ShaderKind::TessEvaluation,
            ShaderStage::Geometry => ShaderKind::Geometry,
            ShaderStage::Fragment => ShaderKind::Fragment,
            ShaderStage::Compute => ShaderKind::Compute,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compilation failed: {0}")]
    Compilation(#[from] shaderc::Error),
    #[error("shader compiler is unavailable")]
    CompilerUnavailable,
}

/// Vulkan environment targeted for a given API version.
fn target_env_version(api_version: Version) -> EnvVersion {
    match (api_version.major(), api_version.minor()) {
        (1, 0) => EnvVersion::Vulkan1_0,
        (1, 1) => EnvVersion::Vulkan1_1,
        (1, 2) => EnvVersion::Vulkan1_2,
        _ => EnvVersion::Vulkan1_3,
    }
}

/// Compiles shader source into SPIR-V 1.5.
pub struct ShaderLoader {
    compiler: Compiler,
    api_version: Version,
}

impl ShaderLoader {
    pub fn new(api_version: Version) -> Result<Self, ShaderLoadError> {
        let compiler = Compiler::new().ok_or(ShaderLoadError::CompilerUnavailable)?;
        tracing::debug!(component = "shader_loader", "shader compiler initialized for Vulkan {api_version}");
        Ok(Self {
            compiler,
            api_version,
        })
    }

    pub fn api_version(&self) -> Version {
        self.api_version
    }

    pub fn load_from_source_file(
        &self,
        path: impl AsRef<Path>,
        stage: ShaderStage,
        language: ShaderLanguage,
    ) -> Result<ShaderStageInfo, ShaderLoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        self.compile(&source, &path.display().to_string(), stage, language)
    }

    pub fn load_from_source_string(
        &self,
        source: &str,
        stage: ShaderStage,
        language: ShaderLanguage,
    ) -> Result<ShaderStageInfo, ShaderLoadError> {
        self.compile(source, "<string>", stage, language)
    }

    /// Reads precompiled SPIR-V. The bytes are passed through unchanged.
    pub fn load_from_binary_file(
        &self,
        path: impl AsRef<Path>,
        stage: ShaderStage,
    ) -> Result<ShaderStageInfo, ShaderLoadError> {
        let bytecode = std::fs::read(path)?;
        Ok(ShaderStageInfo { stage, bytecode })
    }

    fn compile(
        &self,
        source: &str,
        file_name: &str,
        stage: ShaderStage,
        language: ShaderLanguage,
    ) -> Result<ShaderStageInfo, ShaderLoadError> {
        let mut options = CompileOptions::new().ok_or(ShaderLoadError::CompilerUnavailable)?;
        options.set_source_language(language.into());
        options.set_target_env(TargetEnv::Vulkan, target_env_version(self.api_version) as u32);
        options.set_target_spirv(SpirvVersion::V1_5);

        let artifact = self
            .compiler
            .compile_into_spirv(source, stage.into(), file_name, "main", Some(&options))
            .inspect_err(|err| {
                tracing::error!(component = "shader_loader", "failed to compile `{file_name}`: {err}")
            })?;
        if artifact.get_num_warnings() > 0 {
            tracing::warn!(
                component = "shader_loader",
                "`{file_name}`: {}",
                artifact.get_warning_messages()
            );
        }
        Ok(ShaderStageInfo {
            stage,
            bytecode: artifact.as_binary_u8().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_env_version() {
        assert!(matches!(target_env_version(Version::V1_0), EnvVersion::Vulkan1_0));
        assert!(matches!(target_env_version(Version::V1_2), EnvVersion::Vulkan1_2));
        assert!(matches!(target_env_version(Version::new(0, 1, 4, 0)), EnvVersion::Vulkan1_3));
    }

    #[test]
    fn test_stage_kinds() {
        assert!(matches!(ShaderKind::from(ShaderStage::TessellationControl), ShaderKind::TessControl));
        assert!(matches!(ShaderKind::from(ShaderStage::Compute), ShaderKind::Compute));
    }
}
