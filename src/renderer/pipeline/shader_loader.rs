//! GLSL Shader Loader
//!
//! Loads GLSL 450 sources, inserts feature `#define`s and runs them through
//! the naga GLSL front-end. The resulting validated modules are handed to
//! wgpu directly, so the naga diagnostics are the compiler log reported in
//! [`RenderError::ShaderCompile`].
//!
//! ## Source lookup
//!
//! | Order | Location                                   |
//! |-------|--------------------------------------------|
//! | 1     | `<shader_root>/<path>` on disk, if present |
//! | 2     | Copy embedded in the binary at build time  |
//!
//! Debug builds without an explicit root read from the crate's own shader
//! directory so edits are picked up without a rebuild.

use std::path::{Path, PathBuf};

use naga::front::glsl;
use rust_embed::RustEmbed;
use rustc_hash::FxHashSet;

use crate::errors::{RenderError, Result};
use crate::renderer::pipeline::reflect::UniformReflection;

#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct ShaderAssets;

/// The two programmable stages a program is linked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// One parsed and validated stage.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub path: PathBuf,
    /// Source text after define insertion.
    pub source: String,
    pub module: naga::Module,
}

/// A vertex + fragment pair that passed the interface check.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

impl CompiledProgram {
    /// Reflects the `(group, binding)` uniform block of both stages.
    #[must_use]
    pub fn uniform_reflection(&self, group: u32, binding: u32) -> UniformReflection {
        let mut reflection = UniformReflection::from_module(&self.vertex.module, group, binding);
        reflection.merge(UniformReflection::from_module(&self.fragment.module, group, binding));
        reflection
    }

    /// Builds the wgpu shader modules for both stages.
    #[must_use]
    pub fn create_modules(
        &self,
        device: &wgpu::Device,
        label: &str,
    ) -> (wgpu::ShaderModule, wgpu::ShaderModule) {
        let create = |stage: &CompiledStage| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label} ({})", stage.stage.name())),
                source: wgpu::ShaderSource::Naga(std::borrow::Cow::Owned(stage.module.clone())),
            })
        };
        (create(&self.vertex), create(&self.fragment))
    }
}

/// Resolves and compiles shader sources.
///
/// Constructed once at startup and shared by every component that builds
/// programs.
#[derive(Debug, Clone, Default)]
pub struct ShaderLoader {
    root: Option<PathBuf>,
}

impl ShaderLoader {
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Loader that only reads the embedded copies.
    #[must_use]
    pub fn embedded() -> Self {
        Self { root: None }
    }

    fn disk_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.root {
            return Some(root.clone());
        }
        if cfg!(all(debug_assertions, not(target_arch = "wasm32"))) {
            return Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("src/renderer/shaders"));
        }
        None
    }

    /// Reads the source text of `path`.
    pub fn load_source(&self, path: &Path) -> Result<String> {
        if let Some(root) = self.disk_root() {
            let full = root.join(path);
            if full.is_file() {
                return std::fs::read_to_string(&full).map_err(|e| RenderError::ShaderRead {
                    path: full,
                    source: Some(e),
                });
            }
        }

        let key = path.to_string_lossy().replace('\\', "/");
        if let Some(file) = ShaderAssets::get(&key)
            && let Ok(source) = std::str::from_utf8(file.data.as_ref())
        {
            return Ok(source.to_string());
        }

        Err(RenderError::ShaderRead {
            path: path.to_path_buf(),
            source: None,
        })
    }

    /// Loads, preprocesses and validates a single stage.
    pub fn compile_stage(
        &self,
        stage: ShaderStage,
        path: &Path,
        defines: &[String],
    ) -> Result<CompiledStage> {
        let source = self.load_source(path)?;
        let source = insert_defines(&source, defines, path)?;

        let compile_error = |log: String| RenderError::ShaderCompile {
            stage: stage.name(),
            path: path.to_path_buf(),
            log,
        };

        let mut frontend = glsl::Frontend::default();
        let module = frontend
            .parse(&glsl::Options::from(stage.to_naga()), &source)
            .map_err(|e| compile_error(e.emit_to_string(&source)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(&source)))?;

        Ok(CompiledStage {
            stage,
            path: path.to_path_buf(),
            source,
            module,
        })
    }

    /// Compiles both stages with the same defines and checks that they link.
    pub fn load_program(
        &self,
        vertex_path: &Path,
        fragment_path: &Path,
        defines: &[String],
    ) -> Result<CompiledProgram> {
        let vertex = self.compile_stage(ShaderStage::Vertex, vertex_path, defines)?;
        let fragment = self.compile_stage(ShaderStage::Fragment, fragment_path, defines)?;

        link(&vertex.module, &fragment.module).map_err(|log| RenderError::ProgramLink {
            vertex_path: vertex_path.to_path_buf(),
            fragment_path: fragment_path.to_path_buf(),
            log,
        })?;

        Ok(CompiledProgram { vertex, fragment })
    }
}

/// Inserts one `#define <name>` line per entry immediately after the
/// `#version` line, keeping the given order.
///
/// Every source must carry a `#version` directive, with or without
/// defines. Sources without defines are otherwise returned unchanged.
pub fn insert_defines(source: &str, defines: &[String], path: &Path) -> Result<String> {
    let version_pos = source
        .find("#version")
        .ok_or_else(|| RenderError::MissingVersionDirective {
            path: path.to_path_buf(),
        })?;

    if defines.is_empty() {
        return Ok(source.to_string());
    }

    let mut block = String::new();
    for define in defines {
        block.push_str("#define ");
        block.push_str(define);
        block.push('\n');
    }

    let mut result = String::with_capacity(source.len() + block.len() + 1);
    match source[version_pos..].find('\n') {
        Some(offset) => {
            let insert_at = version_pos + offset + 1;
            result.push_str(&source[..insert_at]);
            result.push_str(&block);
            result.push_str(&source[insert_at..]);
        }
        None => {
            result.push_str(source);
            result.push('\n');
            result.push_str(&block);
        }
    }
    Ok(result)
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage)
}

/// Collects the user locations of a binding or, for structs, of its members.
fn collect_locations(
    module: &naga::Module,
    binding: Option<&naga::Binding>,
    ty: naga::Handle<naga::Type>,
    out: &mut FxHashSet<u32>,
) {
    if let Some(naga::Binding::Location { location, .. }) = binding {
        out.insert(*location);
        return;
    }
    if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
        for member in members {
            collect_locations(module, member.binding.as_ref(), member.ty, out);
        }
    }
}

/// Checks that every fragment input location is written by the vertex stage.
fn link(vertex: &naga::Module, fragment: &naga::Module) -> std::result::Result<(), String> {
    let vs = entry_point(vertex, naga::ShaderStage::Vertex)
        .ok_or_else(|| "vertex module has no vertex entry point".to_string())?;
    let fs = entry_point(fragment, naga::ShaderStage::Fragment)
        .ok_or_else(|| "fragment module has no fragment entry point".to_string())?;

    let mut outputs = FxHashSet::default();
    if let Some(result) = &vs.function.result {
        collect_locations(vertex, result.binding.as_ref(), result.ty, &mut outputs);
    }

    let mut inputs = FxHashSet::default();
    for argument in &fs.function.arguments {
        collect_locations(fragment, argument.binding.as_ref(), argument.ty, &mut inputs);
    }

    let mut missing: Vec<u32> = inputs.difference(&outputs).copied().collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort_unstable();
    Err(format!(
        "fragment input location(s) {missing:?} are not written by the vertex stage"
    ))
}
