pub mod format;
use ash::vk;
use std::fmt::Debug;

pub trait AsVkHandle {
    type Handle: ash::vk::Handle + Copy;
    fn vk_handle(&self) -> Self::Handle;
}
impl<T> AsVkHandle for &'_ T
where
    T: AsVkHandle,
{
    type Handle = T::Handle;

    fn vk_handle(&self) -> Self::Handle {
        T::vk_handle(self)
    }
}
impl<T> AsVkHandle for &'_ mut T
where
    T: AsVkHandle,
{
    type Handle = T::Handle;

    fn vk_handle(&self) -> Self::Handle {
        T::vk_handle(self)
    }
}

/// A packed Vulkan API version.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u32);
impl Version {
    pub const V1_0: Self = Self::new(0, 1, 0, 0);
    pub const V1_1: Self = Self::new(0, 1, 1, 0);
    pub const V1_2: Self = Self::new(0, 1, 2, 0);
    pub const V1_3: Self = Self::new(0, 1, 3, 0);

    pub const fn new(variant: u32, major: u32, minor: u32, patch: u32) -> Self {
        let num = vk::make_api_version(variant, major, minor, patch);
        Self(num)
    }
    pub const fn major(&self) -> u32 {
        vk::api_version_major(self.0)
    }
    pub const fn minor(&self) -> u32 {
        vk::api_version_minor(self.0)
    }
    pub const fn patch(&self) -> u32 {
        vk::api_version_patch(self.0)
    }
    pub const fn variant(&self) -> u32 {
        vk::api_version_variant(self.0)
    }
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
    /// Drops the patch number, so driver versions like 1.3.250 compare equal to 1.3.
    pub const fn without_patch(&self) -> Self {
        Self::new(self.variant(), self.major(), self.minor(), 0)
    }
}
impl Default for Version {
    fn default() -> Self {
        Self::V1_2
    }
}
impl Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Version({self})")
    }
}
impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        let variant = self.variant();
        if variant != 0 {
            write!(f, " variant {variant}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(Version::V1_3 > Version::V1_2);
        assert!(Version::new(0, 1, 2, 189) > Version::V1_2);
        assert_eq!(Version::new(0, 1, 2, 189).without_patch(), Version::V1_2);
        assert_eq!(Version::new(0, 1, 3, 250).to_string(), "1.3.250");
        assert_eq!(Version::new(1, 1, 0, 0).variant(), 1);
    }
}
