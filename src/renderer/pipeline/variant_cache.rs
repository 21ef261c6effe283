//! Shader Variant Cache
//!
//! Maps a [`VariantKey`] to a compiled, uniform-bound program. Lookups hash
//! the key alone into the map; a miss compiles the variant's GLSL through the
//! [`ShaderLoader`], resolves its uniform table and asks the
//! [`ProgramFactory`] for the backend program. Failed compiles are returned
//! to the caller and leave nothing behind in the cache.
//!
//! The backend is a type parameter so the cache can be driven without a GPU.

use std::path::PathBuf;

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::renderer::draw_order::PassKind;
use crate::renderer::pipeline::program_id::ProgramId;
use crate::renderer::pipeline::shader_loader::{CompiledProgram, ShaderLoader};
use crate::renderer::pipeline::uniforms::{UniformBlock, VariantUniforms};
use crate::renderer::pipeline::variant_key::VariantKey;
use crate::resources::Material;
use crate::scene::LightContext;

/// Bind group and binding of the per-draw uniform block in every variant.
pub const VARIANT_UNIFORM_GROUP: u32 = 0;
pub const VARIANT_UNIFORM_BINDING: u32 = 0;

/// Backend half of a compiled variant.
pub trait VariantProgram {
    /// Stores one draw's uniform block and returns the offset it will be
    /// bound at.
    fn upload(&mut self, block: &UniformBlock) -> u32;
}

/// Creates backend programs for freshly compiled variants.
pub trait ProgramFactory {
    type Program: VariantProgram;

    fn build(
        &mut self,
        key: &VariantKey,
        compiled: &CompiledProgram,
        uniforms: &VariantUniforms,
    ) -> Result<Self::Program>;
}

/// One compiled variant.
#[derive(Debug)]
pub struct ShaderVariant<P> {
    id: ProgramId,
    key: VariantKey,
    uniforms: VariantUniforms,
    program: P,
}

impl<P: VariantProgram> ShaderVariant<P> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &VariantKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &VariantUniforms {
        &self.uniforms
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> &P {
        &self.program
    }

    #[inline]
    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    /// Fills this variant's uniforms for one draw and hands them to the
    /// program. Returns the uniform offset to bind with the draw.
    pub fn use_program(
        &mut self,
        material: &Material,
        lights: &LightContext,
        pass: PassKind,
        mvp: &Mat4,
        model: &Mat4,
    ) -> u32 {
        let mut block = UniformBlock::zeroed(self.uniforms.block_size);
        self.uniforms.apply(&mut block, material, lights, pass, mvp, model);
        self.program.upload(&block)
    }
}

pub struct ShaderVariantCache<F: ProgramFactory> {
    loader: ShaderLoader,
    factory: F,

    vertex_path: PathBuf,
    fragment_path: PathBuf,

    lookup: FxHashMap<VariantKey, ProgramId>,
    variants: Vec<ShaderVariant<F::Program>>,
}

impl<F: ProgramFactory> ShaderVariantCache<F> {
    pub const DEFAULT_VERTEX_SHADER: &'static str = "textured.vert";
    pub const DEFAULT_FRAGMENT_SHADER: &'static str = "textured.frag";

    #[must_use]
    pub fn new(loader: ShaderLoader, factory: F) -> Self {
        Self::with_sources(
            loader,
            factory,
            PathBuf::from(Self::DEFAULT_VERTEX_SHADER),
            PathBuf::from(Self::DEFAULT_FRAGMENT_SHADER),
        )
    }

    #[must_use]
    pub fn with_sources(loader: ShaderLoader, factory: F, vertex_path: PathBuf, fragment_path: PathBuf) -> Self {
        Self {
            loader,
            factory,
            vertex_path,
            fragment_path,
            lookup: FxHashMap::default(),
            variants: Vec::new(),
        }
    }

    /// Returns the variant for `key`, compiling it on first use.
    pub fn get_or_compile(&mut self, key: &VariantKey) -> Result<&mut ShaderVariant<F::Program>> {
        if let Some(&id) = self.lookup.get(key) {
            return Ok(&mut self.variants[id.index()]);
        }

        let compiled = self
            .loader
            .load_program(&self.vertex_path, &self.fragment_path, &key.defines())?;
        let reflection = compiled.uniform_reflection(VARIANT_UNIFORM_GROUP, VARIANT_UNIFORM_BINDING);
        let uniforms = VariantUniforms::resolve(&reflection, key);
        let program = self.factory.build(key, &compiled, &uniforms)?;

        let id = ProgramId::new(self.variants.len() as u32 + 1);
        log::debug!(
            "Compiled shader variant {id:?}: flags={:?} point={} spot={}",
            key.flags,
            key.point_lights,
            key.spot_lights
        );

        self.variants.push(ShaderVariant {
            id,
            key: *key,
            uniforms,
            program,
        });
        self.lookup.insert(*key, id);
        Ok(&mut self.variants[id.index()])
    }

    #[must_use]
    pub fn get(&self, id: ProgramId) -> Option<&ShaderVariant<F::Program>> {
        if !id.is_resolved() {
            return None;
        }
        self.variants.get(id.index())
    }

    #[must_use]
    pub fn contains(&self, key: &VariantKey) -> bool {
        self.lookup.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShaderVariant<F::Program>> {
        self.variants.iter_mut()
    }

    #[inline]
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &ShaderLoader {
        &self.loader
    }
}
