//! Initial dye field patterns.

use serde::{Deserialize, Serialize};

/// Pattern used to seed the dye field at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DyeSeed {
    /// Alternating light/dark blocks, `blocks` per grid edge.
    Checkerboard { blocks: usize },
    /// A single uniform color.
    Solid { color: [f32; 3] },
    /// All texels zero.
    Blank,
}

impl Default for DyeSeed {
    fn default() -> Self {
        DyeSeed::Checkerboard { blocks: 10 }
    }
}

impl DyeSeed {
    /// Generate RGBA texel data for a `width x height` grid.
    ///
    /// The returned vector always holds exactly `width * height * 4`
    /// floats, the layout a `FieldBuffer` expects.
    pub fn generate(&self, width: usize, height: usize) -> Vec<f32> {
        let mut data = Vec::with_capacity(width * height * 4);

        match self {
            DyeSeed::Checkerboard { blocks } => {
                let block_size = (width as f32 / (*blocks).max(1) as f32).max(1.0);
                for y in 0..height {
                    for x in 0..width {
                        let x_step = (x as f32 / block_size) as usize;
                        let y_step = (y as f32 / block_size) as usize;
                        let val = if (x_step + y_step) % 2 == 0 { 1.0 } else { 0.0 };
                        data.extend_from_slice(&[val, val, val, 1.0]);
                    }
                }
            }
            DyeSeed::Solid { color } => {
                for _ in 0..width * height {
                    data.extend_from_slice(&[color[0], color[1], color[2], 1.0]);
                }
            }
            DyeSeed::Blank => {
                data.resize(width * height * 4, 0.0);
            }
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn checkerboard_alternates_blocks() {
        let seed = DyeSeed::Checkerboard { blocks: 2 };
        let data = seed.generate(4, 4);
        // Block size 2: (0,0) light, (2,0) dark, (2,2) light again.
        assert_eq!(data[0], 1.0);
        assert_eq!(data[2 * 4], 0.0);
        assert_eq!(data[(2 * 4 + 2) * 4], 1.0);
    }

    #[test]
    fn solid_fills_color() {
        let seed = DyeSeed::Solid {
            color: [0.2, 0.4, 0.6],
        };
        let data = seed.generate(3, 3);
        assert_eq!(&data[..4], &[0.2, 0.4, 0.6, 1.0]);
        assert_eq!(&data[4 * 8..], &[0.2, 0.4, 0.6, 1.0]);
    }

    #[test]
    fn serde_tagged_representation() {
        let json = r#"{"type": "Checkerboard", "blocks": 8}"#;
        let seed: DyeSeed = serde_json::from_str(json).unwrap();
        assert!(matches!(seed, DyeSeed::Checkerboard { blocks: 8 }));
    }

    proptest! {
        #[test]
        fn generated_data_has_rgba_length(
            w in 1usize..64,
            h in 1usize..64,
            blocks in 1usize..16,
        ) {
            let data = DyeSeed::Checkerboard { blocks }.generate(w, h);
            prop_assert_eq!(data.len(), w * h * 4);
        }

        #[test]
        fn blank_is_all_zero(w in 1usize..32, h in 1usize..32) {
            let data = DyeSeed::Blank.generate(w, h);
            prop_assert!(data.iter().all(|&v| v == 0.0));
        }
    }
}
