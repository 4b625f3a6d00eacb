//! Combine policies: how a received interface value merges into the local one.

/// *InterfacePolicy* decides what an incoming interface value does to the
/// local entry it arrives at.
pub trait InterfacePolicy<V>: Sized {
    /// Merge an incoming value into the local value.
    fn fuse(local: &mut V, incoming: V);
}

/// Incoming value overwrites the local one.
#[derive(Copy, Clone, Debug)]
pub struct CopyPolicy;

impl<V> InterfacePolicy<V> for CopyPolicy {
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local = incoming;
    }
}

/// Incoming value is added to the local one.
#[derive(Copy, Clone, Debug)]
pub struct AddPolicy;

impl<V> InterfacePolicy<V> for AddPolicy
where
    V: std::ops::AddAssign,
{
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local += incoming;
    }
}

/// Incoming value is subtracted from the local one.
#[derive(Copy, Clone, Debug)]
pub struct SubtractPolicy;

impl<V> InterfacePolicy<V> for SubtractPolicy
where
    V: std::ops::SubAssign,
{
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local -= incoming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_fuse() {
        let mut x = 5.0f64;
        <AddPolicy as InterfacePolicy<f64>>::fuse(&mut x, 2.0);
        assert_eq!(x, 7.0);
        <SubtractPolicy as InterfacePolicy<f64>>::fuse(&mut x, 3.0);
        assert_eq!(x, 4.0);
        <CopyPolicy as InterfacePolicy<f64>>::fuse(&mut x, -1.0);
        assert_eq!(x, -1.0);
    }
}
