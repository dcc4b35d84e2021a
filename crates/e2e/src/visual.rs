//! Screenshot artifacts and visual baseline comparison

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference tolerated before a pixel counts as changed
const CHANNEL_TOLERANCE: i32 = 5;

/// A screenshot written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

impl ScreenshotArtifact {
    /// Validate PNG bytes and write them to `path`, replacing any previous file.
    pub fn write(path: &Path, png: &[u8]) -> E2eResult<Self> {
        if png.is_empty() {
            return Err(E2eError::Screenshot(format!(
                "empty capture for {}",
                path.display()
            )));
        }

        let decoded = image::load_from_memory_with_format(png, image::ImageFormat::Png)
            .map_err(|e| E2eError::Screenshot(format!("{} is not a PNG: {}", path.display(), e)))?;
        let (width, height) = decoded.dimensions();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, png)?;

        info!("Screenshot saved: {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            bytes: png.len() as u64,
            width,
            height,
            sha256: sha256_hex(png),
        })
    }

    /// File name used to look up a baseline
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Result of comparing one screenshot with its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaselineOutcome {
    /// No reference image existed
    Missing { name: String, created: bool },
    /// Compared against a reference image
    Compared(BaselineDiff),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDiff {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image: Option<PathBuf>,
}

/// Reference screenshots kept between runs
pub struct BaselineStore {
    dir: PathBuf,
    threshold_percent: f64,
    update_missing: bool,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>, threshold_percent: f64, update_missing: bool) -> Self {
        Self {
            dir: dir.into(),
            threshold_percent,
            update_missing,
        }
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Compare `artifact` with the baseline of the same file name
    pub fn compare(&self, artifact: &ScreenshotArtifact) -> E2eResult<BaselineOutcome> {
        let name = artifact.name();
        let baseline_path = self.baseline_path(&name);

        if !baseline_path.exists() {
            let created = if self.update_missing {
                std::fs::create_dir_all(&self.dir)?;
                std::fs::copy(&artifact.path, &baseline_path)?;
                info!("Created baseline {}", baseline_path.display());
                true
            } else {
                info!("No baseline for '{}'", name);
                false
            };
            return Ok(BaselineOutcome::Missing { name, created });
        }

        let baseline_bytes = std::fs::read(&baseline_path)?;
        if sha256_hex(&baseline_bytes) == artifact.sha256 {
            debug!("'{}' matches its baseline byte for byte", name);
            return Ok(BaselineOutcome::Compared(BaselineDiff {
                name,
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: u64::from(artifact.width) * u64::from(artifact.height),
                diff_image: None,
            }));
        }

        let actual = image::open(&artifact.path)?.to_rgba8();
        let baseline = image::load_from_memory(&baseline_bytes)?.to_rgba8();

        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "'{}' dimensions differ: actual {:?} vs baseline {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (diff_img, diff_pixels) = pixel_diff(&actual, &baseline);
        let (width, height) = actual.dimensions();
        let total_pixels = u64::from(width) * u64::from(height);
        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64 * 100.0
        };
        let matches = diff_percent <= self.threshold_percent;

        let diff_image = if diff_pixels > 0 {
            let stem = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| name.clone());
            let path = self.dir.join(format!("{}-diff.png", stem));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "'{}' differs from baseline: {:.2}% pixels (threshold {:.2}%)",
                name, diff_percent, self.threshold_percent
            );
        }

        Ok(BaselineOutcome::Compared(BaselineDiff {
            name,
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image,
        }))
    }
}

/// Mark differing pixels red over a dimmed copy of `actual`.
///
/// Pixels outside the region both images share count as different.
fn pixel_diff(actual: &RgbaImage, baseline: &RgbaImage) -> (RgbaImage, u64) {
    let (width, height) = actual.dimensions();
    let mut diff = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for (x, y, pixel) in actual.enumerate_pixels() {
        let differs = match baseline.get_pixel_checked(x, y) {
            Some(reference) => pixels_differ(pixel, reference),
            None => true,
        };
        if differs {
            diff_pixels += 1;
            diff.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
        } else {
            let c = pixel.channels();
            diff.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
        }
    }

    (diff, diff_pixels)
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > CHANNEL_TOLERANCE)
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn write_records_dimensions_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/question_1.png");
        let data = png(8, 4, [10, 20, 30, 255]);

        let artifact = ScreenshotArtifact::write(&path, &data).unwrap();
        assert_eq!((artifact.width, artifact.height), (8, 4));
        assert_eq!(artifact.bytes, data.len() as u64);
        assert_eq!(artifact.sha256, sha256_hex(&data));
        assert_eq!(artifact.name(), "question_1.png");
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn write_overwrites_previous_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        ScreenshotArtifact::write(&path, &png(2, 2, [0, 0, 0, 255])).unwrap();
        let second = png(3, 3, [255, 255, 255, 255]);
        ScreenshotArtifact::write(&path, &second).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), second);
    }

    #[test]
    fn write_rejects_empty_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        assert!(matches!(
            ScreenshotArtifact::write(&path, &[]),
            Err(E2eError::Screenshot(_))
        ));
        assert!(matches!(
            ScreenshotArtifact::write(&path, b"not an image"),
            Err(E2eError::Screenshot(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn missing_baseline_is_created_when_updating() {
        let dir = tempfile::tempdir().unwrap();
        let shot = ScreenshotArtifact::write(&dir.path().join("a.png"), &png(2, 2, [1, 2, 3, 255])).unwrap();

        let store = BaselineStore::new(dir.path().join("baselines"), 0.5, false);
        assert_eq!(
            store.compare(&shot).unwrap(),
            BaselineOutcome::Missing { name: "a.png".into(), created: false }
        );

        let store = BaselineStore::new(dir.path().join("baselines"), 0.5, true);
        assert_eq!(
            store.compare(&shot).unwrap(),
            BaselineOutcome::Missing { name: "a.png".into(), created: true }
        );
        assert!(store.baseline_path("a.png").exists());
    }

    #[test]
    fn identical_baseline_matches() {
        let dir = tempfile::tempdir().unwrap();
        let data = png(4, 4, [9, 9, 9, 255]);
        let shot = ScreenshotArtifact::write(&dir.path().join("b.png"), &data).unwrap();
        std::fs::create_dir_all(dir.path().join("base")).unwrap();
        std::fs::write(dir.path().join("base/b.png"), &data).unwrap();

        let store = BaselineStore::new(dir.path().join("base"), 0.5, false);
        match store.compare(&shot).unwrap() {
            BaselineOutcome::Compared(diff) => {
                assert!(diff.matches);
                assert_eq!(diff.diff_pixels, 0);
                assert_eq!(diff.total_pixels, 16);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn differing_baseline_reports_percent_and_diff_image() {
        let dir = tempfile::tempdir().unwrap();
        let shot = ScreenshotArtifact::write(&dir.path().join("c.png"), &png(4, 4, [0, 0, 0, 255])).unwrap();
        std::fs::create_dir_all(dir.path().join("base")).unwrap();
        std::fs::write(dir.path().join("base/c.png"), png(4, 4, [200, 0, 0, 255])).unwrap();

        let store = BaselineStore::new(dir.path().join("base"), 0.5, false);
        match store.compare(&shot).unwrap() {
            BaselineOutcome::Compared(diff) => {
                assert!(!diff.matches);
                assert_eq!(diff.diff_pixels, 16);
                assert!((diff.diff_percent - 100.0).abs() < f64::EPSILON);
                assert!(diff.diff_image.unwrap().ends_with("c-diff.png"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn small_channel_noise_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let shot = ScreenshotArtifact::write(&dir.path().join("d.png"), &png(4, 4, [100, 100, 100, 255])).unwrap();
        std::fs::create_dir_all(dir.path().join("base")).unwrap();
        std::fs::write(dir.path().join("base/d.png"), png(4, 4, [103, 98, 100, 255])).unwrap();

        let store = BaselineStore::new(dir.path().join("base"), 0.0, false);
        match store.compare(&shot).unwrap() {
            BaselineOutcome::Compared(diff) => {
                assert!(diff.matches);
                assert_eq!(diff.diff_pixels, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
