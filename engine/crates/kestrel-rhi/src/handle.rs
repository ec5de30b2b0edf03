use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// 带有代数（generation）的资源句柄
///
/// `Tag` 只用于区分资源类型，texture 句柄不能当作 buffer 句柄使用。
/// 手动实现各个 trait，这样不会要求 `Tag` 本身实现它们。
pub struct Handle<Tag> {
    id: u32,
    generation: u32,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> Handle<Tag> {
    pub const NULL_ID: u32 = u32::MAX;

    #[inline]
    pub(crate) const fn new(id: u32, generation: u32) -> Self {
        Self {
            id,
            generation,
            _tag: PhantomData,
        }
    }

    #[inline]
    pub const fn null() -> Self {
        Self::new(Self::NULL_ID, 0)
    }

    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// 只检查是否为 null；是否仍然存活需要询问对应的 pool
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.id != Self::NULL_ID
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        !self.is_valid()
    }
}

impl<Tag> Default for Handle<Tag> {
    fn default() -> Self {
        Self::null()
    }
}

impl<Tag> Clone for Handle<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Handle<Tag> {}

impl<Tag> PartialEq for Handle<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.generation == other.generation
    }
}

impl<Tag> Eq for Handle<Tag> {}

impl<Tag> Hash for Handle<Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.generation.hash(state);
    }
}

impl<Tag> fmt::Debug for Handle<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Handle<{}>(null)", short_type_name::<Tag>());
        }
        write!(f, "Handle<{}>({}v{})", short_type_name::<Tag>(), self.id, self.generation)
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

pub enum TextureTag {}
pub enum BufferTag {}
pub enum ShaderTag {}
pub enum CommandBufferTag {}

pub type TextureHandle = Handle<TextureTag>;
pub type BufferHandle = Handle<BufferTag>;
pub type ShaderHandle = Handle<ShaderTag>;
pub type CommandBufferHandle = Handle<CommandBufferTag>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_is_null() {
        let handle = TextureHandle::default();
        assert!(handle.is_null());
        assert_eq!(handle.id(), u32::MAX);
        assert_eq!(handle, TextureHandle::null());
    }

    #[test]
    fn test_equality_includes_generation() {
        let a = BufferHandle::new(3, 0);
        let b = BufferHandle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a, BufferHandle::new(3, 0));

        let set: HashSet<_> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", ShaderHandle::new(2, 5)), "Handle<ShaderTag>(2v5)");
        assert_eq!(format!("{:?}", ShaderHandle::null()), "Handle<ShaderTag>(null)");
    }
}
