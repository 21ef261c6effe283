//! Uniform block reflection
//!
//! Flattens a uniform block's naga type tree into GL-style member paths
//! (`MVP`, `POINT_LIGHTS[1].color`, ...) mapped to byte offsets. Members
//! compiled out by the preprocessor are simply absent from the map.

use rustc_hash::FxHashMap;

/// Offset and size of one leaf member inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedMember {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UniformReflection {
    size: u32,
    members: FxHashMap<String, ReflectedMember>,
}

impl UniformReflection {
    /// Reflects the uniform-address-space global bound at `(group, binding)`.
    /// Returns an empty reflection when the module declares no such block.
    #[must_use]
    pub fn from_module(module: &naga::Module, group: u32, binding: u32) -> Self {
        let mut reflection = Self::default();

        let block = module.global_variables.iter().find(|(_, var)| {
            var.space == naga::AddressSpace::Uniform
                && var
                    .binding
                    .as_ref()
                    .is_some_and(|b| b.group == group && b.binding == binding)
        });
        let Some((_, var)) = block else {
            return reflection;
        };

        let gctx = module.to_ctx();
        reflection.size = module.types[var.ty].inner.size(gctx);

        if let naga::TypeInner::Struct { members, .. } = &module.types[var.ty].inner {
            for member in members {
                let name = member.name.clone().unwrap_or_default();
                reflection.flatten(module, &name, member.ty, member.offset);
            }
        }
        reflection
    }

    fn flatten(&mut self, module: &naga::Module, path: &str, ty: naga::Handle<naga::Type>, offset: u32) {
        match &module.types[ty].inner {
            naga::TypeInner::Struct { members, .. } => {
                for member in members {
                    let name = member.name.as_deref().unwrap_or_default();
                    self.flatten(module, &format!("{path}.{name}"), member.ty, offset + member.offset);
                }
            }
            naga::TypeInner::Array {
                base,
                size: naga::ArraySize::Constant(count),
                stride,
            } => {
                for i in 0..count.get() {
                    self.flatten(module, &format!("{path}[{i}]"), *base, offset + i * stride);
                }
            }
            inner => {
                self.members.insert(
                    path.to_string(),
                    ReflectedMember {
                        offset,
                        size: inner.size(module.to_ctx()),
                    },
                );
            }
        }
    }

    /// Adds members the other stage declares. The block size is the larger of the two.
    pub fn merge(&mut self, other: UniformReflection) {
        self.size = self.size.max(other.size);
        for (name, member) in other.members {
            self.members.entry(name).or_insert(member);
        }
    }

    /// Total block size in bytes (0 when no block was found).
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn member(&self, path: &str) -> Option<ReflectedMember> {
        self.members.get(path).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
