use crate::error::{GeometryError, StageLocation};

/// Computes the output side length of a U-Net built from unpadded convolutions.
///
/// `depth` counts the levels of the U: `depth - 1` max pooling layers, one bottom
/// stage and `depth - 1` up-sampling layers. Every convolution shrinks the side by
/// `filter_size - 1`.
///
/// Fails if the side length drops below zero anywhere, or if it is not divisible by
/// `pool_size` in front of a pooling layer.
pub fn output_side_length(
    side_length: usize,
    depth: usize,
    convolutions: usize,
    filter_size: usize,
    pool_size: usize,
) -> Result<usize, GeometryError> {
    for (name, value) in [
        ("depth", depth),
        ("filter_size", filter_size),
        ("pool_size", pool_size),
    ] {
        if value == 0 {
            return Err(GeometryError::ZeroParameter { name });
        }
    }

    let erosion = (filter_size - 1) as i64;
    let mut side = side_length as i64;

    let convolve = |side: &mut i64, location: StageLocation| {
        for convolution in 1..=convolutions {
            *side -= erosion;
            if *side < 0 {
                return Err(GeometryError::TooSmall {
                    location,
                    convolution,
                    side_length: *side,
                });
            }
        }
        Ok(())
    };

    for stage in 0..depth - 1 {
        convolve(&mut side, StageLocation::Contracting(stage))?;

        if side % pool_size as i64 != 0 {
            return Err(GeometryError::NotDivisible {
                stage,
                side_length: side as usize,
                pool_size,
            });
        }
        side /= pool_size as i64;
    }

    convolve(&mut side, StageLocation::Bottom)?;

    for stage in 0..depth - 1 {
        side = side * pool_size as i64 - convolutions as i64 * erosion;
        if side < 0 {
            return Err(GeometryError::TooSmall {
                location: StageLocation::Expanding(stage + 1),
                convolution: convolutions,
                side_length: side,
            });
        }
    }

    Ok(side as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_unet_geometry() {
        assert_eq!(output_side_length(572, 5, 2, 3, 2), Ok(388));
    }

    #[test]
    fn single_level_only_erodes() {
        assert_eq!(output_side_length(10, 1, 2, 3, 2), Ok(6));
        assert_eq!(output_side_length(10, 1, 3, 1, 2), Ok(10));
    }

    #[test]
    fn repeated_calls_agree() {
        for side in 0..200 {
            let first = output_side_length(side, 3, 2, 3, 2);
            assert_eq!(first, output_side_length(side, 3, 2, 3, 2));
        }
    }

    #[test]
    fn larger_inputs_never_shrink_the_output() {
        let feasible: Vec<(usize, usize)> = (0..600)
            .filter_map(|side| {
                output_side_length(side, 4, 2, 3, 2)
                    .ok()
                    .map(|out| (side, out))
            })
            .collect();

        assert!(feasible.len() > 10);
        for pair in feasible.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn erosion_past_zero_reports_stage_and_convolution() {
        // 10 -> 8 -> 6, pool -> 3, then 3 -> 1 -> -1
        let err = output_side_length(10, 4, 2, 3, 2).unwrap_err();
        assert_eq!(
            err,
            GeometryError::TooSmall {
                location: StageLocation::Contracting(1),
                convolution: 2,
                side_length: -1,
            }
        );
        assert!(err.to_string().contains("after 1 max pooling layers"));
    }

    #[test]
    fn erosion_past_zero_at_bottom() {
        let err = output_side_length(4, 2, 2, 3, 2).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::TooSmall {
                location: StageLocation::Bottom,
                convolution: 1,
                ..
            }
        ));
    }

    #[test]
    fn indivisible_side_reports_first_offending_stage() {
        // 13 - 2 = 11 is odd before the first pool.
        assert_eq!(
            output_side_length(13, 3, 2, 2, 2),
            Err(GeometryError::NotDivisible {
                stage: 0,
                side_length: 11,
                pool_size: 2,
            })
        );

        // 16 - 2 = 14 -> 7, then 7 - 2 = 5 is odd before the second pool.
        let err = output_side_length(16, 3, 2, 2, 2).unwrap_err();
        assert_eq!(
            err,
            GeometryError::NotDivisible {
                stage: 1,
                side_length: 5,
                pool_size: 2,
            }
        );
        assert!(err.to_string().contains("before max pooling layer 2"));
    }

    #[test]
    fn zero_parameters_are_rejected() {
        assert_eq!(
            output_side_length(64, 0, 2, 3, 2),
            Err(GeometryError::ZeroParameter { name: "depth" })
        );
        assert_eq!(
            output_side_length(64, 2, 2, 3, 0),
            Err(GeometryError::ZeroParameter { name: "pool_size" })
        );
    }
}
