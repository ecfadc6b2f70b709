//! Image decoding and input source collection.
//!
//! Sources may be single files, directories (non-recursive) or glob patterns.
//! Every decoded image is reduced to a single 8-bit luma channel before it
//! reaches the metric engine.

use crate::color_utils::symbols;
use crate::error::MediqError;
use anyhow::Result;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for image collection behavior
#[derive(Debug, Clone)]
pub struct ImageInputConfig {
    pub require_glob_matches: bool,
    pub strict_mode: bool,
}

impl Default for ImageInputConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            require_glob_matches: true,
        }
    }
}

impl ImageInputConfig {
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            require_glob_matches: true,
        }
    }

    pub fn permissive() -> Self {
        Self {
            strict_mode: false,
            require_glob_matches: false,
        }
    }

    /// If strict=true, uses strict mode; if strict=false, uses permissive mode
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::strict()
        } else {
            Self::permissive()
        }
    }
}

/// Check if a file is a supported image format
/// Supports: jpg, jpeg, png, webp, bmp, tiff, tif
pub fn is_supported_image_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext_lower = ext.to_string_lossy().to_lowercase();
        matches!(
            ext_lower.as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" | "tif"
        )
    } else {
        false
    }
}

/// Find all image files in a directory (non-recursive), sorted by path
pub fn find_images_in_directory(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();

    for entry in fs::read_dir(dir_path)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && is_supported_image_file(&path) {
            image_files.push(path);
        }
    }

    image_files.sort();
    Ok(image_files)
}

/// Collect all image files from multiple sources (files, directories, or glob patterns)
pub fn collect_images_from_sources(
    sources: &[String],
    config: &ImageInputConfig,
) -> Result<Vec<PathBuf>> {
    let mut all_image_files = Vec::new();

    for source in sources {
        let source_path = Path::new(source);

        if source_path.is_file() {
            if is_supported_image_file(source_path) {
                all_image_files.push(source_path.to_path_buf());
            } else if config.strict_mode {
                return Err(anyhow::anyhow!(
                    "File is not a supported image format: {}",
                    source_path.display()
                ));
            }
        } else if source_path.is_dir() {
            let dir_images = find_images_in_directory(source_path)?;
            all_image_files.extend(dir_images);
        } else if !source.contains('*') && !source.contains('?') && !source.contains('[') {
            if config.strict_mode {
                return Err(anyhow::anyhow!("File does not exist: {}", source));
            } else {
                log::warn!("{}File does not exist: {}", symbols::warning(), source);
            }
        } else {
            match glob::glob(source) {
                Ok(paths) => {
                    let mut found_any = false;
                    for path_result in paths {
                        match path_result {
                            Ok(path) => {
                                if path.is_file() && is_supported_image_file(&path) {
                                    all_image_files.push(path);
                                    found_any = true;
                                }
                            }
                            Err(e) => {
                                log::warn!(
                                    "{}Error reading path in glob {source}: {e}",
                                    symbols::warning()
                                );
                            }
                        }
                    }
                    if !found_any && config.require_glob_matches {
                        return Err(anyhow::anyhow!(
                            "No image files found matching pattern: {}",
                            source
                        ));
                    }
                }
                Err(_) => {
                    if config.strict_mode {
                        return Err(anyhow::anyhow!(
                            "Source path does not exist and is not a valid glob pattern: {}",
                            source
                        ));
                    } else {
                        log::warn!(
                            "{}Source path does not exist: {}",
                            symbols::warning(),
                            source
                        );
                    }
                }
            }
        }
    }

    all_image_files.sort();
    // Same file may be named by several sources
    all_image_files.dedup();

    if all_image_files.is_empty() && config.strict_mode {
        return Err(anyhow::anyhow!(
            "No image files found in the specified sources"
        ));
    }

    Ok(all_image_files)
}

/// BT.601 luma in 14-bit fixed point, rounded to nearest
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    const R_W: u32 = 4899; // 0.299 * 2^14
    const G_W: u32 = 9617; // 0.587 * 2^14
    const B_W: u32 = 1868; // 0.114 * 2^14
    let acc = r as u32 * R_W + g as u32 * G_W + b as u32 * B_W + (1 << 13);
    (acc >> 14) as u8
}

/// Reduce any decoded image to 8-bit grayscale.
///
/// Images without colour channels keep their luma (16-bit samples are scaled
/// down, alpha is dropped). Colour images use BT.601 weights.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    if !img.color().has_color() {
        return img.to_luma8();
    }

    let rgb = img.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        Luma([bt601_luma(p[0], p[1], p[2])])
    })
}

/// Decode an encoded byte stream (container detected from the bytes) into a
/// grayscale grid
pub fn decode_grayscale(bytes: &[u8], source_name: &str) -> crate::error::Result<GrayImage> {
    let img = image::load_from_memory(bytes).map_err(|e| MediqError::decode(source_name, e))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(MediqError::decode(source_name, "image has no pixels"));
    }

    Ok(to_grayscale(&img))
}

/// Read and decode an image file into a grayscale grid
pub fn load_grayscale(path: &Path) -> crate::error::Result<GrayImage> {
    let name = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| MediqError::decode(name.clone(), e))?;
    decode_grayscale(&bytes, &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_is_supported_image_file() {
        assert!(is_supported_image_file(Path::new("test.jpg")));
        assert!(is_supported_image_file(Path::new("test.jpeg")));
        assert!(is_supported_image_file(Path::new("test.png")));
        assert!(is_supported_image_file(Path::new("test.webp")));
        assert!(is_supported_image_file(Path::new("test.bmp")));
        assert!(is_supported_image_file(Path::new("test.tiff")));
        assert!(is_supported_image_file(Path::new("test.tif")));

        assert!(is_supported_image_file(Path::new("00000001_000.PNG")));

        assert!(!is_supported_image_file(Path::new("Data_Entry_2017.csv")));
        assert!(!is_supported_image_file(Path::new("test.gif")));
        assert!(!is_supported_image_file(Path::new("test")));
    }

    #[test]
    fn test_find_images_in_directory_is_sorted() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        fs::write(dir_path.join("b.png"), b"fake image").unwrap();
        fs::write(dir_path.join("a.jpg"), b"fake image").unwrap();
        fs::write(dir_path.join("notes.txt"), b"text file").unwrap();

        let images = find_images_in_directory(dir_path).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_collect_images_strict_mode() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        let image_path = dir_path.join("test.jpg");
        let text_path = dir_path.join("test.txt");
        fs::write(&image_path, b"fake image").unwrap();
        fs::write(&text_path, b"text file").unwrap();

        let config = ImageInputConfig::strict();

        let sources = vec![image_path.to_string_lossy().to_string()];
        let result = collect_images_from_sources(&sources, &config);
        assert_eq!(result.unwrap().len(), 1);

        let sources = vec![text_path.to_string_lossy().to_string()];
        assert!(collect_images_from_sources(&sources, &config).is_err());

        let missing = vec![dir_path.join("missing.png").to_string_lossy().to_string()];
        assert!(collect_images_from_sources(&missing, &config).is_err());
    }

    #[test]
    fn test_collect_images_permissive_mode() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        let image_path = dir_path.join("test.jpg");
        let text_path = dir_path.join("test.txt");
        fs::write(&image_path, b"fake image").unwrap();
        fs::write(&text_path, b"text file").unwrap();

        let config = ImageInputConfig::permissive();

        let sources = vec![
            image_path.to_string_lossy().to_string(),
            text_path.to_string_lossy().to_string(),
            dir_path.join("missing.png").to_string_lossy().to_string(),
        ];
        let result = collect_images_from_sources(&sources, &config).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_collect_images_glob_and_dedup() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        fs::write(dir_path.join("scan1.png"), b"fake image").unwrap();
        fs::write(dir_path.join("scan2.png"), b"fake image").unwrap();

        let pattern = dir_path.join("*.png").to_string_lossy().to_string();
        let dir = dir_path.to_string_lossy().to_string();
        let result =
            collect_images_from_sources(&[pattern, dir], &ImageInputConfig::default()).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_from_strict_flag() {
        let strict_config = ImageInputConfig::from_strict_flag(true);
        assert!(strict_config.strict_mode);
        assert!(strict_config.require_glob_matches);

        let permissive_config = ImageInputConfig::from_strict_flag(false);
        assert!(!permissive_config.strict_mode);
        assert!(!permissive_config.require_glob_matches);
    }

    #[test]
    fn test_bt601_luma() {
        assert_eq!(bt601_luma(0, 0, 0), 0);
        assert_eq!(bt601_luma(255, 255, 255), 255);
        assert_eq!(bt601_luma(255, 0, 0), 76);
        assert_eq!(bt601_luma(0, 255, 0), 150);
        assert_eq!(bt601_luma(0, 0, 255), 29);
        assert_eq!(bt601_luma(128, 128, 128), 128);
    }

    #[test]
    fn test_decode_png_grayscale_round_trip() {
        let img = GrayImage::from_fn(8, 4, |x, y| Luma([(x * 30 + y) as u8]));
        let bytes = encode(DynamicImage::ImageLuma8(img.clone()), ImageFormat::Png);

        let decoded = decode_grayscale(&bytes, "scan.png").unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_decode_color_png_converts_to_luma() {
        let rgb = RgbImage::from_pixel(3, 2, Rgb([255, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Png);

        let decoded = decode_grayscale(&bytes, "red.png").unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(decoded.pixels().all(|p| p[0] == 76));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = decode_grayscale(b"definitely not an image", "junk.png").unwrap_err();
        assert!(err.is_skippable());
        assert!(err.to_string().contains("junk.png"));
    }

    #[test]
    fn test_load_grayscale_missing_file_is_decode_error() {
        let temp_dir = tempdir().unwrap();
        let err = load_grayscale(&temp_dir.path().join("gone.png")).unwrap_err();
        assert!(err.is_skippable());
    }
}
