use crate::result::*;

/// A checked cast from u64 to usize
///
/// Record lengths come from the archive (or from a remote object's size),
/// so we check them before allocating a buffer of that size.
pub fn usize<I: Into<u64>>(i: I) -> ZipResult<usize> {
    let i: u64 = i.into();
    usize::try_from(i).map_err(|_| ZipError::InsufficientAddressSpace)
}
