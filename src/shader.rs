//! Shader programs and reflection-driven pipeline layouts.
//!
//! A [`Shader`] is built from a list of SPIR-V stages. Every stage is reflected,
//! and the per-stage descriptor bindings and push constant blocks are merged
//! into a single [`ReflectionInfo`]:
//!
//! - Bindings are keyed by `(set, binding)`. Two stages declaring the same key
//!   must agree on descriptor kind and count; their stage masks are unioned.
//! - One descriptor set layout is created for every set index from 0 to the
//!   highest set used, so the set array handed to the pipeline layout is
//!   contiguous. Unused indices get an empty layout.
//! - Push constant block sizes are summed per stage. All stages that declare
//!   push constants must agree on that size. The result is a single range at
//!   offset 0, omitted when no stage declares any push constants.
//!
//! The merge itself is [`merge_reflection`], a pure function over
//! [`StageReflection`] records, so it can be used without a device.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use ash::vk;
use spirq::{ReflectConfig, ty::DescriptorType, var::Variable};

use crate::{
    Device, HasDevice,
    descriptor::DescriptorSetLayout,
    pipeline::{PipelineLayout, ShaderModule, spirv_words},
    utils::AsVkHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl From<ShaderStage> for vk::ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

/// A single compiled stage: SPIR-V bytes plus the stage they are meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageInfo {
    pub stage: ShaderStage,
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderInfo {
    pub name: String,
    pub stages: Vec<ShaderStageInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    InputAttachment,
    AccelerationStructure,
}

impl From<DescriptorKind> for vk::DescriptorType {
    fn from(kind: DescriptorKind) -> Self {
        match kind {
            DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
            DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            DescriptorKind::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            DescriptorKind::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            DescriptorKind::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
            DescriptorKind::AccelerationStructure => {
                vk::DescriptorType::ACCELERATION_STRUCTURE_KHR
            }
        }
    }
}

impl From<&DescriptorType> for DescriptorKind {
    fn from(ty: &DescriptorType) -> Self {
        match ty {
            DescriptorType::Sampler() => DescriptorKind::Sampler,
            DescriptorType::CombinedImageSampler() => DescriptorKind::CombinedImageSampler,
            DescriptorType::SampledImage() => DescriptorKind::SampledImage,
            DescriptorType::StorageImage(_) => DescriptorKind::StorageImage,
            DescriptorType::UniformTexelBuffer() => DescriptorKind::UniformTexelBuffer,
            DescriptorType::StorageTexelBuffer(_) => DescriptorKind::StorageTexelBuffer,
            DescriptorType::UniformBuffer() => DescriptorKind::UniformBuffer,
            DescriptorType::StorageBuffer(_) => DescriptorKind::StorageBuffer,
            DescriptorType::InputAttachment(_) => DescriptorKind::InputAttachment,
            DescriptorType::AccelStruct() => DescriptorKind::AccelerationStructure,
        }
    }
}

/// One descriptor binding as seen by one or more stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    /// Array length. Runtime-sized arrays reflect as 0.
    pub count: u32,
    pub kind: DescriptorKind,
    pub stages: vk::ShaderStageFlags,
}

impl ReflectedBinding {
    pub fn to_vk(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.kind.into())
            .descriptor_count(self.count)
            .stage_flags(self.stages)
    }
}

/// Reflection output of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReflection {
    pub stage: ShaderStage,
    pub bindings: Vec<ReflectedBinding>,
    /// Sum of the sizes of every push constant block in the stage.
    pub push_constant_size: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("failed to reflect {stage:?} stage: {message}")]
    Parse { stage: ShaderStage, message: String },
    #[error(
        "binding {binding} of set {set} is declared as {found_count}x {found_kind:?} by the {stage:?} stage, \
         but as {expected_count}x {expected_kind:?} by an earlier stage"
    )]
    BindingConflict {
        set: u32,
        binding: u32,
        stage: ShaderStage,
        expected_kind: DescriptorKind,
        expected_count: u32,
        found_kind: DescriptorKind,
        found_count: u32,
    },
    #[error(
        "push constants of the {stage:?} stage span {found} bytes, but earlier stages declare {expected} bytes"
    )]
    PushConstantSizeMismatch {
        expected: u32,
        found: u32,
        stage: ShaderStage,
    },
    #[error("bytecode is not a SPIR-V word stream")]
    InvalidBytecode,
}

/// Merged interface of every stage of a shader program.
#[derive(Debug, Clone, Default)]
pub struct ReflectionInfo {
    bindings: BTreeMap<(u32, u32), ReflectedBinding>,
    max_set: u32,
    push_constant_range: Option<vk::PushConstantRange>,
}

impl ReflectionInfo {
    pub fn binding(&self, set: u32, binding: u32) -> Option<&ReflectedBinding> {
        self.bindings.get(&(set, binding))
    }

    /// All merged bindings ordered by `(set, binding)`.
    pub fn bindings(&self) -> impl Iterator<Item = &ReflectedBinding> {
        self.bindings.values()
    }

    /// Number of set layouts the pipeline layout needs, always at least one.
    pub fn set_count(&self) -> u32 {
        self.max_set + 1
    }

    /// Layout bindings grouped per set index, `0..set_count()`.
    pub fn set_layout_bindings(&self) -> Vec<Vec<vk::DescriptorSetLayoutBinding<'static>>> {
        let mut sets = vec![Vec::new(); self.set_count() as usize];
        for binding in self.bindings.values() {
            sets[binding.set as usize].push(binding.to_vk());
        }
        sets
    }

    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> {
        self.push_constant_range
    }
}

/// Merges the reflection of every stage into a single [`ReflectionInfo`].
pub fn merge_reflection(stages: &[StageReflection]) -> Result<ReflectionInfo, ReflectionError> {
    let mut bindings: BTreeMap<(u32, u32), ReflectedBinding> = BTreeMap::new();
    let mut max_set = 0;
    let mut push_constant_size = 0;
    let mut push_constant_stages = vk::ShaderStageFlags::empty();

    for stage in stages {
        let stage_flags = vk::ShaderStageFlags::from(stage.stage);
        for binding in &stage.bindings {
            max_set = max_set.max(binding.set);
            match bindings.get_mut(&(binding.set, binding.binding)) {
                None => {
                    bindings.insert(
                        (binding.set, binding.binding),
                        ReflectedBinding {
                            stages: stage_flags,
                            ..*binding
                        },
                    );
                }
                Some(existing) => {
                    if existing.kind != binding.kind || existing.count != binding.count {
                        return Err(ReflectionError::BindingConflict {
                            set: binding.set,
                            binding: binding.binding,
                            stage: stage.stage,
                            expected_kind: existing.kind,
                            expected_count: existing.count,
                            found_kind: binding.kind,
                            found_count: binding.count,
                        });
                    }
                    existing.stages |= stage_flags;
                }
            }
        }

        if stage.push_constant_size != 0 {
            if push_constant_size != 0 && push_constant_size != stage.push_constant_size {
                return Err(ReflectionError::PushConstantSizeMismatch {
                    expected: push_constant_size,
                    found: stage.push_constant_size,
                    stage: stage.stage,
                });
            }
            push_constant_size = stage.push_constant_size;
        }
        push_constant_stages |= stage_flags;
    }

    let push_constant_range = (push_constant_size != 0).then(|| vk::PushConstantRange {
        stage_flags: push_constant_stages,
        offset: 0,
        size: push_constant_size,
    });
    Ok(ReflectionInfo {
        bindings,
        max_set,
        push_constant_range,
    })
}

/// Size of a push constant block rounded up to whole 32-bit words, as push
/// constant ranges must be multiples of 4 bytes.
fn padded_push_constant_size(nbyte: usize) -> u32 {
    nbyte.next_multiple_of(4) as u32
}

/// Reflects the descriptor bindings and push constants of the `main` entry point.
///
/// Every declared resource is reported, whether or not the entry point
/// statically uses it.
pub fn reflect_stage(stage: ShaderStage, bytecode: &[u8]) -> Result<StageReflection, ReflectionError> {
    let words = spirv_words(bytecode).ok_or(ReflectionError::InvalidBytecode)?;
    let entry_points = ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|err| ReflectionError::Parse {
            stage,
            message: err.to_string(),
        })?;
    let entry_point = entry_points
        .into_iter()
        .find(|entry| entry.name == "main")
        .ok_or_else(|| ReflectionError::Parse {
            stage,
            message: "no `main` entry point".to_string(),
        })?;

    let mut bindings = Vec::new();
    let mut push_constant_size = 0;
    for var in &entry_point.vars {
        match var {
            Variable::Descriptor {
                desc_bind,
                desc_ty,
                nbind,
                ..
            } => bindings.push(ReflectedBinding {
                set: desc_bind.set(),
                binding: desc_bind.bind(),
                count: *nbind,
                kind: desc_ty.into(),
                stages: stage.into(),
            }),
            Variable::PushConstant { ty, .. } => {
                push_constant_size += padded_push_constant_size(ty.nbyte().unwrap_or(0));
            }
            _ => {}
        }
    }
    Ok(StageReflection {
        stage,
        bindings,
        push_constant_size,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error(transparent)]
    Reflection(#[from] ReflectionError),
    #[error("vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

/// A shader program: one module per stage plus the pipeline layout synthesized
/// from their reflection.
pub struct Shader {
    name: String,
    // Modules go first, the layout outlives them.
    modules: Vec<ShaderModule>,
    layout: PipelineLayout,
    reflection: ReflectionInfo,
}

impl Shader {
    pub fn new(device: Device, info: &ShaderInfo) -> Result<Self, ShaderError> {
        let reflected = info
            .stages
            .iter()
            .map(|stage| reflect_stage(stage.stage, &stage.bytecode))
            .collect::<Result<Vec<_>, _>>()?;
        let reflection = merge_reflection(&reflected)?;

        let modules = info
            .stages
            .iter()
            .map(|stage| ShaderModule::new(device.clone(), stage.stage.into(), &stage.bytecode))
            .collect::<Result<Vec<_>, _>>()?;

        let set_layouts = reflection
            .set_layout_bindings()
            .iter()
            .map(|bindings| DescriptorSetLayout::new(device.clone(), bindings).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let layout = PipelineLayout::new(device, set_layouts, reflection.push_constant_range())?;
        layout.device().set_debug_name(layout.vk_handle(), &info.name);

        tracing::info!(component = "shader", "shader `{}` created", info.name);
        Ok(Self {
            name: info.name.clone(),
            modules,
            layout,
            reflection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader modules in the order the stages were given.
    pub fn modules(&self) -> &[ShaderModule] {
        &self.modules
    }

    pub fn stage_create_infos(&self) -> Vec<vk::PipelineShaderStageCreateInfo<'static>> {
        self.modules.iter().map(ShaderModule::stage_create_info).collect()
    }

    pub fn reflection(&self) -> &ReflectionInfo {
        &self.reflection
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }
}

impl Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("stages", &self.modules.len())
            .field("layout", &self.layout)
            .finish()
    }
}

impl AsVkHandle for Shader {
    type Handle = vk::PipelineLayout;

    fn vk_handle(&self) -> Self::Handle {
        self.layout.vk_handle()
    }
}

impl HasDevice for Shader {
    fn device(&self) -> &Device {
        self.layout.device()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        tracing::info!(component = "shader", "shader `{}` destroyed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        shader_loader::{ShaderLanguage, ShaderLoader},
        utils::Version,
    };

    fn binding(set: u32, binding: u32, kind: DescriptorKind, count: u32) -> ReflectedBinding {
        ReflectedBinding {
            set,
            binding,
            count,
            kind,
            stages: vk::ShaderStageFlags::empty(),
        }
    }

    fn stage(stage: ShaderStage, bindings: Vec<ReflectedBinding>, push: u32) -> StageReflection {
        StageReflection {
            stage,
            bindings,
            push_constant_size: push,
        }
    }

    #[test]
    fn test_merge_unions_stage_flags() {
        let vertex = stage(
            ShaderStage::Vertex,
            vec![binding(0, 0, DescriptorKind::UniformBuffer, 1)],
            64,
        );
        let fragment = stage(
            ShaderStage::Fragment,
            vec![
                binding(0, 0, DescriptorKind::UniformBuffer, 1),
                binding(0, 1, DescriptorKind::CombinedImageSampler, 4),
            ],
            64,
        );
        let info = merge_reflection(&[vertex, fragment]).unwrap();

        let shared = info.binding(0, 0).unwrap();
        assert_eq!(
            shared.stages,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            "stage masks are unioned"
        );
        assert_eq!(shared.kind, DescriptorKind::UniformBuffer);
        assert_eq!(info.binding(0, 1).unwrap().stages, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(info.binding(0, 1).unwrap().count, 4);

        let range = info.push_constant_range().unwrap();
        assert_eq!(range.size, 64);
        assert_eq!(range.offset, 0);
        assert_eq!(
            range.stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_merge_kind_conflict() {
        let vertex = stage(
            ShaderStage::Vertex,
            vec![binding(1, 2, DescriptorKind::UniformBuffer, 1)],
            0,
        );
        let fragment = stage(
            ShaderStage::Fragment,
            vec![binding(1, 2, DescriptorKind::StorageBuffer, 1)],
            0,
        );
        match merge_reflection(&[vertex, fragment]) {
            Err(ReflectionError::BindingConflict {
                set,
                binding,
                stage,
                expected_kind,
                found_kind,
                ..
            }) => {
                assert_eq!((set, binding), (1, 2));
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(expected_kind, DescriptorKind::UniformBuffer);
                assert_eq!(found_kind, DescriptorKind::StorageBuffer);
            }
            other => panic!("expected a binding conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_count_conflict() {
        let a = stage(
            ShaderStage::Vertex,
            vec![binding(0, 0, DescriptorKind::SampledImage, 2)],
            0,
        );
        let b = stage(
            ShaderStage::Fragment,
            vec![binding(0, 0, DescriptorKind::SampledImage, 3)],
            0,
        );
        assert!(
            matches!(
                merge_reflection(&[a, b]),
                Err(ReflectionError::BindingConflict {
                    expected_count: 2,
                    found_count: 3,
                    ..
                })
            ),
            "descriptor counts must agree"
        );
    }

    #[test]
    fn test_push_constant_mismatch() {
        let a = stage(ShaderStage::Vertex, vec![], 64);
        let b = stage(ShaderStage::Fragment, vec![], 32);
        assert!(matches!(
            merge_reflection(&[a, b]),
            Err(ReflectionError::PushConstantSizeMismatch {
                expected: 64,
                found: 32,
                stage: ShaderStage::Fragment,
            })
        ));
    }

    /// Stages without push constants neither conflict nor reset the size.
    #[test]
    fn test_push_constant_absent_in_some_stages() {
        let a = stage(ShaderStage::Vertex, vec![], 0);
        let b = stage(ShaderStage::Fragment, vec![], 16);
        let c = stage(ShaderStage::Geometry, vec![], 0);
        let info = merge_reflection(&[a, b, c]).unwrap();
        assert_eq!(info.push_constant_range().unwrap().size, 16);
    }

    #[test]
    fn test_no_push_constants_omits_range() {
        let a = stage(
            ShaderStage::Compute,
            vec![binding(0, 0, DescriptorKind::StorageBuffer, 1)],
            0,
        );
        let info = merge_reflection(&[a]).unwrap();
        assert!(info.push_constant_range().is_none());
    }

    #[test]
    fn test_sets_are_contiguous() {
        let a = stage(
            ShaderStage::Compute,
            vec![
                binding(2, 1, DescriptorKind::StorageImage, 1),
                binding(0, 3, DescriptorKind::Sampler, 1),
                binding(2, 0, DescriptorKind::StorageBuffer, 1),
            ],
            0,
        );
        let info = merge_reflection(&[a]).unwrap();
        assert_eq!(info.set_count(), 3);

        let sets = info.set_layout_bindings();
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].len(), 1);
        assert!(sets[1].is_empty(), "unused set index gets an empty layout");
        assert_eq!(
            sets[2].iter().map(|b| b.binding).collect::<Vec<_>>(),
            vec![0, 1],
            "bindings are ordered within a set"
        );
        assert_eq!(sets[2][1].descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(sets[2][1].stage_flags, vk::ShaderStageFlags::COMPUTE);
    }

    #[test]
    fn test_empty_program_has_one_set() {
        let info = merge_reflection(&[]).unwrap();
        assert_eq!(info.set_count(), 1);
        assert!(info.set_layout_bindings()[0].is_empty());
        assert!(info.push_constant_range().is_none());
    }

    #[test]
    fn test_reflect_rejects_garbage() {
        assert!(matches!(
            reflect_stage(ShaderStage::Vertex, &[1, 2, 3]),
            Err(ReflectionError::InvalidBytecode)
        ));
        assert!(matches!(
            reflect_stage(ShaderStage::Vertex, &[0u8; 16]),
            Err(ReflectionError::InvalidBytecode)
        ));
    }
    #[test]
    fn test_push_constant_size_is_word_padded() {
        assert_eq!(padded_push_constant_size(64), 64);
        assert_eq!(padded_push_constant_size(6), 8);
        assert_eq!(padded_push_constant_size(0), 0);
    }

    const VERTEX_SOURCE: &str = r#"
        #version 450
        layout(set = 0, binding = 0) uniform Camera { mat4 view_proj; } camera;
        layout(push_constant) uniform Push { mat4 model; } push;
        layout(location = 0) in vec3 position;
        void main() {
            gl_Position = camera.view_proj * push.model * vec4(position, 1.0);
        }
    "#;

    const FRAGMENT_SOURCE: &str = r#"
        #version 450
        layout(set = 0, binding = 0) uniform Camera { mat4 view_proj; } camera;
        layout(set = 1, binding = 2) uniform sampler2D textures[4];
        layout(push_constant) uniform Push { mat4 model; } push;
        layout(location = 0) out vec4 color;
        void main() {
            color = texture(textures[1], vec2(0.5)) * camera.view_proj[0] * push.model[0];
        }
    "#;

    const CONFLICTING_FRAGMENT_SOURCE: &str = r#"
        #version 450
        layout(set = 0, binding = 0) buffer Camera { mat4 view_proj; } camera;
        layout(location = 0) out vec4 color;
        void main() {
            color = camera.view_proj[0];
        }
    "#;

    fn compile_and_reflect(source: &str, stage: ShaderStage) -> StageReflection {
        let loader = ShaderLoader::new(Version::V1_2).expect("shaderc is available");
        let info = loader
            .load_from_source_string(source, stage, ShaderLanguage::Glsl)
            .expect("test shader compiles");
        reflect_stage(stage, &info.bytecode).expect("compiled SPIR-V reflects")
    }

    #[test]
    fn test_reflect_compiled_stages() {
        let vertex = compile_and_reflect(VERTEX_SOURCE, ShaderStage::Vertex);
        assert_eq!(vertex.push_constant_size, 64, "a mat4 push block is 64 bytes");
        assert_eq!(vertex.bindings.len(), 1);
        let camera = vertex.bindings[0];
        assert_eq!((camera.set, camera.binding), (0, 0));
        assert_eq!(camera.kind, DescriptorKind::UniformBuffer);
        assert_eq!(camera.count, 1);

        let fragment = compile_and_reflect(FRAGMENT_SOURCE, ShaderStage::Fragment);
        let textures = fragment
            .bindings
            .iter()
            .find(|b| (b.set, b.binding) == (1, 2))
            .expect("sampler array is reflected");
        assert_eq!(textures.kind, DescriptorKind::CombinedImageSampler);
        assert_eq!(textures.count, 4, "array length is the descriptor count");

        let info = merge_reflection(&[vertex, fragment]).unwrap();
        assert_eq!(
            info.binding(0, 0).map(|b| b.stages),
            Some(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
            "shared binding is visible to both stages"
        );
        assert_eq!(
            info.binding(1, 2).map(|b| b.stages),
            Some(vk::ShaderStageFlags::FRAGMENT)
        );
        assert_eq!(info.set_count(), 2);
        let range = info.push_constant_range().expect("push constants declared");
        assert_eq!(range.size, 64);
        assert_eq!(range.offset, 0);
        assert_eq!(
            range.stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_reflect_compiled_kind_conflict() {
        let vertex = compile_and_reflect(VERTEX_SOURCE, ShaderStage::Vertex);
        let fragment = compile_and_reflect(CONFLICTING_FRAGMENT_SOURCE, ShaderStage::Fragment);
        assert!(
            matches!(
                merge_reflection(&[vertex, fragment]),
                Err(ReflectionError::BindingConflict {
                    set: 0,
                    binding: 0,
                    expected_kind: DescriptorKind::UniformBuffer,
                    found_kind: DescriptorKind::StorageBuffer,
                    ..
                })
            ),
            "uniform vs storage buffer at the same slot must conflict"
        );
    }
}
