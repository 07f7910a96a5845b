/// Scale and offset parameters for mapping raw samples to physical
/// units, fetched from the instrument once per channel acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleParameters {
    pub x_origin: f64,
    pub x_increment: f64,
    pub x_reference: f64,
    pub y_origin: f64,
    pub y_increment: f64,
    pub y_reference: f64,
}

impl ScaleParameters {
    /// Time of the sample at `index` (0-based).
    pub fn time_at(&self, index: usize) -> f64 {
        self.x_origin + (index as f64 - self.x_reference) * self.x_increment
    }

    /// Voltage of a raw sample value.
    pub fn voltage_of(&self, raw: f64) -> f64 {
        (raw - self.y_reference - self.y_origin) * self.y_increment
    }

    /// Map a raw sample buffer to (time, voltage) pairs. Works for both
    /// the float and the byte acquisition path; every value goes through
    /// f64 before the arithmetic.
    pub fn convert<T>(&self, samples: &[T]) -> Vec<(f64, f64)>
    where
        T: Copy + Into<f64>,
    {
        samples
            .iter()
            .enumerate()
            .map(|(i, &v)| (self.time_at(i), self.voltage_of(v.into())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScaleParameters {
        ScaleParameters {
            x_origin: 0.0,
            x_increment: 1.0,
            x_reference: 0.0,
            y_origin: 0.0,
            y_increment: 2.0,
            y_reference: 1.0,
        }
    }

    #[test]
    fn test_affine_conversion() {
        let samples: [u8; 6] = [0, 0, 0, 0, 0, 10];
        let pairs = params().convert(&samples);
        assert_eq!(pairs[5], (5.0, 18.0));
    }

    #[test]
    fn test_float_and_byte_paths_agree() {
        let p = params();
        let bytes: [u8; 3] = [1, 2, 3];
        let floats: [f32; 3] = [1.0, 2.0, 3.0];
        assert_eq!(p.convert(&bytes), p.convert(&floats));
    }

    #[test]
    fn test_time_uses_reference_offset() {
        let p = ScaleParameters {
            x_origin: 10.0,
            x_increment: 0.5,
            x_reference: 4.0,
            y_origin: 0.0,
            y_increment: 1.0,
            y_reference: 0.0,
        };
        assert_eq!(p.time_at(0), 8.0);
        assert_eq!(p.time_at(4), 10.0);
    }
}
