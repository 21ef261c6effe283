//! 着色器变体模块
//!
//! 管理着色器编译和变体缓存：
//! - [`ShaderLoader`]: GLSL 源加载、`#define` 注入、naga 解析与校验
//! - [`VariantKey`]: 材质能力 × 光源数量 → 变体键
//! - [`ShaderVariantCache`]: 按键懒编译、去重
//! - `uniforms` / `reflect`: uniform 位置解析与写入
//! - `gpu_program`: wgpu 后端（管线、动态 uniform 缓冲、材质绑定）

pub mod gpu_program;
pub mod program_id;
pub mod reflect;
pub mod shader_loader;
pub mod uniforms;
pub mod variant_cache;
pub mod variant_key;

pub use program_id::ProgramId;
pub use reflect::UniformReflection;
pub use shader_loader::{CompiledProgram, CompiledStage, ShaderLoader, ShaderStage, insert_defines};
pub use uniforms::{AMBIENT, UniformBlock, UniformSlot, VariantUniforms};
pub use variant_cache::{ProgramFactory, ShaderVariant, ShaderVariantCache, VariantProgram};
pub use variant_key::{VariantFlags, VariantKey, flags_for, key_for};
