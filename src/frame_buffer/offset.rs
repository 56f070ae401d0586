
//! Address arithmetic for frame buffer views that are shifted by a number of scan lines.

use std::convert::TryFrom;
use crate::error::{Error, Result};


/// Compute the base of a slice in a view that is shifted by `offset` scan lines.
///
/// Scan line `y + offset` of the shifted slice addresses the same bytes
/// as scan line `y` of the original slice, so the new base is
/// `base - y_stride * (offset / y_sampling)`.
///
/// Fails if the offset is not a multiple of the vertical sampling,
/// because the rows of a subsampled slice cannot be shifted by a fraction.
pub fn offset_base(base: isize, y_stride: isize, y_sampling: usize, offset: i32) -> Result<isize> {
    if y_sampling == 0 {
        return Err(Error::invalid("zero sampling factor"));
    }

    let y_sampling = i64::try_from(y_sampling)
        .map_err(|_| Error::invalid("sampling factor"))?;

    let offset = i64::from(offset);
    if offset % y_sampling != 0 {
        return Err(Error::invalid(format!(
            "scan line offset {} is not a multiple of the vertical sampling {}",
            offset, y_sampling
        )));
    }

    let rows = offset / y_sampling;

    let shifted = (y_stride as i64).checked_mul(rows)
        .and_then(|shift| (base as i64).checked_sub(shift))
        .and_then(|shifted| isize::try_from(shifted).ok());

    shifted.ok_or_else(|| Error::invalid("scan line offset exceeds the address space"))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shifts_by_whole_rows(){
        assert_eq!(offset_base(1000, 16, 1, 3).unwrap(), 1000 - 48);
        assert_eq!(offset_base(1000, 16, 1, 0).unwrap(), 1000);
        assert_eq!(offset_base(0, 16, 1, -2).unwrap(), 32);
    }

    #[test]
    fn negative_strides_move_forward(){
        assert_eq!(offset_base(64, -16, 1, 2).unwrap(), 96);
    }

    #[test]
    fn subsampled_rows(){
        assert_eq!(offset_base(100, 8, 2, 4).unwrap(), 84);
        assert_eq!(offset_base(100, 8, 2, -6).unwrap(), 124);
    }

    #[test]
    fn misaligned_offsets_are_rejected(){
        assert!(matches!(offset_base(100, 8, 2, 3), Err(Error::Invalid(_))));
        assert!(offset_base(100, 8, 3, -1).is_err());
        assert!(offset_base(100, 8, 0, 0).is_err());
    }

    #[test]
    fn overflow_is_an_error(){
        assert!(offset_base(isize::MIN, 1 << 30, 1, i32::MAX).is_err());
    }
}
