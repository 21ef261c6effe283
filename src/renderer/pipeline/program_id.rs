//! Strongly-typed program handles.
//!
//! A [`ProgramId`] identifies one compiled shading variant inside the
//! [`ShaderVariantCache`](super::ShaderVariantCache). Ids are handed out in
//! compile order starting at 1; drawables that have not resolved a variant
//! yet report [`ProgramId::UNRESOLVED`], which sorts before every real id.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProgramId(pub(crate) u32);

impl ProgramId {
    pub const UNRESOLVED: Self = Self(0);

    #[inline]
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(self) -> bool {
        self.0 != 0
    }

    /// Index into the cache's variant storage. Only meaningful when resolved.
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }
}
