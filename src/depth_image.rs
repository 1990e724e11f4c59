//! Owned depth buffers and the plaintext depth-map interchange format.
//!
//! A depth image is a contiguous `width × height` buffer of normalized
//! window-space depth values in `[0, 1]`, row 0 at the bottom of the
//! viewport. The on-disk format is whitespace-separated floats, `width`
//! values per line and `height` lines, as produced by the reference
//! depth-dump tooling.

use anyhow::{bail, ensure, Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Depth written for pixels no geometry covers (the far plane).
pub const BACKGROUND_DEPTH: f32 = 1.0;

/// A depth-only image with explicit dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthImage {
    /// A `width × height` image filled with the background depth.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, BACKGROUND_DEPTH)
    }

    /// A `width × height` image filled with `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing buffer; errors if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        ensure!(
            data.len() == width * height,
            "depth buffer holds {} values, expected {}x{} = {}",
            data.len(),
            width,
            height,
            width * height
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = value;
    }

    /// Per-pixel absolute difference against an image of the same size.
    pub fn abs_diff(&self, other: &DepthImage) -> Result<DepthImage> {
        ensure!(
            self.width == other.width && self.height == other.height,
            "cannot difference {}x{} against {}x{}",
            self.width,
            self.height,
            other.width,
            other.height
        );
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .collect();
        Ok(DepthImage {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Read a depth map from the plaintext format. All rows must have the
    /// same number of values; blank lines are ignored.
    pub fn from_text_file(path: impl AsRef<Path>) -> Result<DepthImage> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open depth map {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut width = 0usize;
        let mut height = 0usize;
        let mut data = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read depth map {}", path.display()))?;
            let mut count = 0usize;
            for token in line.split_whitespace() {
                let value: f32 = token.parse().with_context(|| {
                    format!(
                        "bad depth value {:?} at {}:{}",
                        token,
                        path.display(),
                        line_no + 1
                    )
                })?;
                data.push(value);
                count += 1;
            }
            if count == 0 {
                continue;
            }
            if height == 0 {
                width = count;
            } else if count != width {
                bail!(
                    "ragged depth map {}: row {} has {} values, expected {}",
                    path.display(),
                    line_no + 1,
                    count,
                    width
                );
            }
            height += 1;
        }
        ensure!(height > 0, "depth map {} is empty", path.display());
        Ok(DepthImage {
            width,
            height,
            data,
        })
    }

    /// Write the plaintext format: one image row per line.
    pub fn write_text_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("failed to create depth map {}", path.display()))?;
        let mut line = String::new();
        for y in 0..self.height {
            line.clear();
            for x in 0..self.width {
                if x > 0 {
                    line.push(' ');
                }
                // Infallible for String.
                let _ = write!(line, "{}", self.get(x, y));
            }
            line.push('\n');
            file.write_all(line.as_bytes())
                .with_context(|| format!("failed to write depth map {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_is_background() {
        let img = DepthImage::new(4, 3);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
        assert!(img.as_slice().iter().all(|&v| v == BACKGROUND_DEPTH));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert!(DepthImage::from_vec(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_abs_diff() {
        let a = DepthImage::from_vec(2, 1, vec![0.25, 0.75]).unwrap();
        let b = DepthImage::from_vec(2, 1, vec![0.5, 0.5]).unwrap();
        let d = a.abs_diff(&b).unwrap();
        assert_relative_eq!(d.get(0, 0), 0.25);
        assert_relative_eq!(d.get(1, 0), 0.25);
    }

    #[test]
    fn test_abs_diff_size_mismatch() {
        let a = DepthImage::new(2, 2);
        let b = DepthImage::new(3, 2);
        assert!(a.abs_diff(&b).is_err());
    }

    #[test]
    fn test_text_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join("pso_depth_matcher_roundtrip.txt");
        let img = DepthImage::from_vec(3, 2, vec![0.0, 0.5, 1.0, 0.125, 0.25, 0.375]).unwrap();
        img.write_text_file(&path).unwrap();
        let back = DepthImage::from_text_file(&path).unwrap();
        assert_eq!(back, img);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_text_ragged_rows_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("pso_depth_matcher_ragged.txt");
        std::fs::write(&path, "0.1 0.2 0.3\n0.4 0.5\n").unwrap();
        assert!(DepthImage::from_text_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_text_bad_token_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("pso_depth_matcher_badtoken.txt");
        std::fs::write(&path, "0.1 oops\n").unwrap();
        assert!(DepthImage::from_text_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_text_empty_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("pso_depth_matcher_empty.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(DepthImage::from_text_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
