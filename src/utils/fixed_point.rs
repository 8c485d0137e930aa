// src/utils/fixed_point.rs
pub const NODATA_VALUE_INT: i16 = -10000;

/// Scale index values into int16. Non-finite samples become `nodata_value`,
/// finite ones are clamped to ±0.9999 before scaling.
pub fn to_fixed_point<'a>(
    data: impl IntoIterator<Item = &'a f32>,
    scale_factor: i32,
    nodata_value: i16,
) -> Vec<i16> {
    data.into_iter()
        .map(|&value| {
            if !value.is_finite() {
                nodata_value
            } else {
                // Clamp to avoid overflow and scale
                let clamped = value.clamp(-0.9999, 0.9999);
                (clamped * scale_factor as f32).round() as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_with_nodata_and_clamping() {
        let values = [0.6667f32, -0.25, f32::NAN, f32::INFINITY, 3.5];
        let fixed = to_fixed_point(&values, 10000, NODATA_VALUE_INT);
        assert_eq!(fixed, vec![6667, -2500, -10000, -10000, 9999]);
    }
}
