//! Arena-handle plumbing shared by every node reference type.

use slab::Slab;

pub trait NullableValue: Clone + Eq {
    fn new_null() -> Self;
    fn is_null(&self) -> bool;

    fn is_nonnull(&self) -> bool {
        !self.is_null()
    }
}

/// Typed handle into a `Slab` arena. The null handle is `usize::MAX`,
/// which a `Slab` can never hand out.
pub trait SlabRef: Copy + Eq + std::fmt::Debug {
    type Item: Sized;

    fn from_handle(handle: usize) -> Self;
    fn get_handle(&self) -> usize;

    fn is_alive(&self, slab: &Slab<Self::Item>) -> bool {
        slab.contains(self.get_handle())
    }

    fn to_data<'a>(&self, slab: &'a Slab<Self::Item>) -> &'a Self::Item {
        slab.get(self.get_handle())
            .unwrap_or_else(|| panic!("stale slab handle {:?}", self))
    }
    fn to_data_mut<'a>(&self, slab: &'a mut Slab<Self::Item>) -> &'a mut Self::Item {
        slab.get_mut(self.get_handle())
            .unwrap_or_else(|| panic!("stale slab handle {:?}", self))
    }
}

impl<T: SlabRef> NullableValue for T {
    fn new_null() -> Self {
        Self::from_handle(usize::MAX)
    }
    fn is_null(&self) -> bool {
        self.get_handle() == usize::MAX
    }
}
