use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

///
/// Shared ownership of a surface.
///
/// Clones refer to the same surface. While an approximation runs it is the
/// only writer: coefficients are replaced after every successful fit and the
/// mesh grows during refinement, and every clone held elsewhere observes
/// these changes. Callers must not hold a borrow across a call into the
/// approximation.
///
#[derive(Debug, Default)]
pub struct SurfaceHandle<S>(Rc<RefCell<S>>);

impl<S> Clone for SurfaceHandle<S>
{
    fn clone(&self) -> Self
    {
        Self(Rc::clone(&self.0))
    }
}

impl<S> SurfaceHandle<S>
{
    pub fn new(surface: S) -> Self
    {
        Self(Rc::new(RefCell::new(surface)))
    }

    pub fn borrow(&self) -> Ref<'_, S>
    {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, S>
    {
        self.0.borrow_mut()
    }

    /// Returns true if both handles refer to the same surface.
    pub fn ptr_eq(&self, other: &Self) -> bool
    {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Take the surface out if this is the only handle left.
    pub fn try_unwrap(self) -> Result<S, Self>
    {
        Rc::try_unwrap(self.0).map(RefCell::into_inner).map_err(Self)
    }
}

impl<S> From<S> for SurfaceHandle<S>
{
    fn from(surface: S) -> Self
    {
        Self::new(surface)
    }
}

#[test]
fn check_clones_observe_mutation()
{
    let handle = SurfaceHandle::new(vec![1.0, 2.0]);
    let observer = handle.clone();
    handle.borrow_mut().push(3.0);
    assert_eq!(observer.borrow().len(), 3);
    assert!(observer.ptr_eq(&handle));
    assert!(handle.try_unwrap().is_err());
    assert_eq!(observer.try_unwrap().ok(), Some(vec![1.0, 2.0, 3.0]));
}
