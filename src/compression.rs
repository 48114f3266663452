use image::{ColorType, DynamicImage, GenericImageView, GrayImage, Rgb, RgbImage};
use log::{debug, info, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use crate::config::{CompressorConfig, Quality, DEFAULT_OUTPUT_PATH};
use crate::errors::{CompressorError, Result};

/// Largest side libjpeg (and therefore mozjpeg) will encode. Anything above it
/// aborts inside the C library instead of returning an error.
pub const MAX_JPEG_DIMENSION: u32 = 65_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JpegAlgorithm {
    #[default]
    MozJpeg,
    JpegEncoder,
    Image,
}

impl JpegAlgorithm {
    pub const NAMES: [&'static str; 3] = ["mozjpeg", "jpeg-encoder", "image"];

    pub fn as_str(&self) -> &'static str {
        match self {
            JpegAlgorithm::MozJpeg => "mozjpeg",
            JpegAlgorithm::JpegEncoder => "jpeg-encoder",
            JpegAlgorithm::Image => "image",
        }
    }
}

impl fmt::Display for JpegAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JpegAlgorithm {
    type Err = CompressorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mozjpeg" => Ok(JpegAlgorithm::MozJpeg),
            "jpeg-encoder" => Ok(JpegAlgorithm::JpegEncoder),
            "image" => Ok(JpegAlgorithm::Image),
            other => Err(CompressorError::InvalidParameters(format!(
                "unknown JPEG algorithm '{}'",
                other
            ))),
        }
    }
}

/// What to do with a raster that carries transparency, which JPEG cannot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaPolicy {
    /// Fail with `EncodingIncompatible`.
    #[default]
    Reject,
    /// Composite over a white background before encoding.
    Flatten,
}

impl AlphaPolicy {
    pub const NAMES: [&'static str; 2] = ["reject", "flatten"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaPolicy::Reject => "reject",
            AlphaPolicy::Flatten => "flatten",
        }
    }
}

impl fmt::Display for AlphaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlphaPolicy {
    type Err = CompressorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(AlphaPolicy::Reject),
            "flatten" => Ok(AlphaPolicy::Flatten),
            other => Err(CompressorError::InvalidParameters(format!(
                "unknown alpha policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionOptions {
    pub quality: Quality,
    pub algorithm: JpegAlgorithm,
    pub alpha_policy: AlphaPolicy,
}

#[derive(Debug, Clone)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    /// Space saved as a percentage of the original; negative when the JPEG is larger.
    pub compression_ratio: f64,
    pub processing_time_ms: u128,
    pub image_width: u32,
    pub image_height: u32,
    pub algorithm_used: String,
}

impl CompressionStats {
    pub fn new(
        original_size: usize,
        compressed_size: usize,
        processing_time_ms: u128,
        width: u32,
        height: u32,
        algorithm: JpegAlgorithm,
    ) -> Self {
        let compression_ratio = if original_size > 0 {
            (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0
        } else {
            0.0
        };

        Self {
            original_size,
            compressed_size,
            compression_ratio,
            processing_time_ms,
            image_width: width,
            image_height: height,
            algorithm_used: algorithm.to_string(),
        }
    }
}

/// Outcome of a file-to-file run.
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub quality: Quality,
    pub stats: CompressionStats,
}

impl CompressionReport {
    pub fn confirmation_message(&self) -> String {
        confirmation_message(&self.output_path, self.quality)
    }
}

pub fn confirmation_message(output_path: &Path, quality: Quality) -> String {
    format!(
        "Image saved as {} with quality={}",
        output_path.display(),
        quality
    )
}

/// Re-encode the image at `path` as JPEG into `compressed_image.jpg`.
pub fn compress<P: AsRef<Path>>(path: P, quality: u8) -> Result<CompressionReport> {
    let config = CompressorConfig::new(path.as_ref(), DEFAULT_OUTPUT_PATH, quality)?;
    compress_with_config(&config)
}

/// Decode `config.source_path`, encode it as JPEG and replace `config.output_path`.
///
/// Decoding and encoding finish in memory before the output file is opened, so
/// an unreadable or unencodable source leaves any existing output untouched.
/// Prints the confirmation line to stdout on success.
pub fn compress_with_config(config: &CompressorConfig) -> Result<CompressionReport> {
    let start = Instant::now();
    info!(
        "Compressing {} -> {} (quality: {}, algorithm: {})",
        config.source_path.display(),
        config.output_path.display(),
        config.quality,
        config.algorithm
    );

    let (img, original_size) = decode_file(&config.source_path)?;
    let (width, height) = img.dimensions();

    // 先在内存中完成编码，再写出文件
    let jpeg_data = encode_jpeg(img, &config.options())?;
    write_output(&config.output_path, &jpeg_data)?;

    let stats = CompressionStats::new(
        original_size,
        jpeg_data.len(),
        start.elapsed().as_millis(),
        width,
        height,
        config.algorithm,
    );
    debug!(
        "Wrote {} bytes to {} in {}ms",
        stats.compressed_size,
        config.output_path.display(),
        stats.processing_time_ms
    );

    let report = CompressionReport {
        source_path: config.source_path.clone(),
        output_path: config.output_path.clone(),
        quality: config.quality,
        stats,
    };
    println!("{}", report.confirmation_message());

    Ok(report)
}

/// In-memory variant: encoded image bytes in, JPEG bytes out.
pub fn compress_image(
    data: &[u8],
    options: &CompressionOptions,
) -> Result<(Vec<u8>, CompressionStats)> {
    let start_time = Instant::now();

    // 通用解码器
    let format = image::guess_format(data).map_err(|_| CompressorError::UnsupportedFormat)?;
    let img = image::load_from_memory_with_format(data, format)?;
    let (width, height) = img.dimensions();
    info!("Decoded {:?} image from memory: {}x{}", format, width, height);

    let jpeg_data = encode_jpeg(img, options)?;

    let stats = CompressionStats::new(
        data.len(),
        jpeg_data.len(),
        start_time.elapsed().as_millis(),
        width,
        height,
        options.algorithm,
    );

    info!(
        "Compressed image: {}x{}, {:.2}% compression ratio, {}ms",
        width, height, stats.compression_ratio, stats.processing_time_ms
    );

    Ok((jpeg_data, stats))
}

// 文件句柄只在本函数内存活
fn decode_file(path: &Path) -> Result<(DynamicImage, usize)> {
    let load_start = Instant::now();
    let unreadable = |source: io::Error| CompressorError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CompressorError::InputNotFound(path.to_path_buf()),
        _ => unreadable(e),
    })?;
    let original_size = file.metadata().map_err(unreadable)?.len() as usize;

    let reader = image::io::Reader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(unreadable)?;
    let format = reader.format().ok_or(CompressorError::UnsupportedFormat)?;
    let img = reader.decode()?;

    info!(
        "Decoded {:?} image: {}x{} {:?}, {} bytes, {:.2}ms",
        format,
        img.width(),
        img.height(),
        img.color(),
        original_size,
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    Ok((img, original_size))
}

fn write_output(path: &Path, jpeg_data: &[u8]) -> Result<()> {
    let write_failed = |source: io::Error| CompressorError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_failed)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(jpeg_data).map_err(write_failed)?;
    writer.flush().map_err(write_failed)?;

    Ok(())
}

fn encode_jpeg(img: DynamicImage, options: &CompressionOptions) -> Result<Vec<u8>> {
    let compression_start = Instant::now();
    let raster = prepare_raster(img, options.alpha_policy)?;

    let jpeg_data = match options.algorithm {
        JpegAlgorithm::MozJpeg => do_mozjpeg_compression(&raster, options.quality)?,
        JpegAlgorithm::JpegEncoder => do_jpeg_encoder_compression(&raster, options.quality)?,
        JpegAlgorithm::Image => do_image_crate_compression(&raster, options.quality)?,
    };

    info!(
        "{} encoded {}x{} at quality {}: {} bytes in {:.2}ms",
        options.algorithm,
        raster.width(),
        raster.height(),
        options.quality,
        jpeg_data.len(),
        compression_start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(jpeg_data)
}

/// 8-bit pixels in a layout every JPEG backend accepts.
#[derive(Debug)]
pub enum JpegRaster {
    Luma(GrayImage),
    Rgb(RgbImage),
}

impl JpegRaster {
    pub fn width(&self) -> u32 {
        match self {
            JpegRaster::Luma(img) => img.width(),
            JpegRaster::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            JpegRaster::Luma(img) => img.height(),
            JpegRaster::Rgb(img) => img.height(),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        match self {
            JpegRaster::Luma(img) => img.as_raw(),
            JpegRaster::Rgb(img) => img.as_raw(),
        }
    }

    pub fn components(&self) -> usize {
        match self {
            JpegRaster::Luma(_) => 1,
            JpegRaster::Rgb(_) => 3,
        }
    }

    pub fn color_type(&self) -> ColorType {
        match self {
            JpegRaster::Luma(_) => ColorType::L8,
            JpegRaster::Rgb(_) => ColorType::Rgb8,
        }
    }
}

/// Narrow the decoded image to something JPEG can hold.
///
/// Grayscale stays grayscale, every other alpha-free layout becomes 8-bit RGB.
/// Transparency is either rejected or flattened depending on `alpha_policy`.
pub fn prepare_raster(img: DynamicImage, alpha_policy: AlphaPolicy) -> Result<JpegRaster> {
    let color = img.color();
    let (width, height) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(CompressorError::EncodingIncompatible {
            color,
            reason: format!("image has no pixels ({}x{})", width, height),
        });
    }
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(CompressorError::EncodingIncompatible {
            color,
            reason: format!(
                "{}x{} exceeds the JPEG limit of {} pixels per side",
                width, height, MAX_JPEG_DIMENSION
            ),
        });
    }

    // JPEG 不支持透明通道
    if color.has_alpha() {
        return match alpha_policy {
            AlphaPolicy::Reject => Err(CompressorError::EncodingIncompatible {
                color,
                reason: "image has an alpha channel; convert it first or use the flatten alpha policy"
                    .to_string(),
            }),
            AlphaPolicy::Flatten => {
                warn!("Flattening {:?} image onto a white background", color);
                Ok(flatten_alpha(&img))
            }
        };
    }

    match color {
        ColorType::L8 | ColorType::L16 => Ok(JpegRaster::Luma(img.into_luma8())),
        _ => {
            if color != ColorType::Rgb8 {
                debug!("Converting {:?} image to 8-bit RGB", color);
            }
            Ok(JpegRaster::Rgb(img.into_rgb8()))
        }
    }
}

fn flatten_alpha(img: &DynamicImage) -> JpegRaster {
    let rgba = img.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([
            blend_over_white(r, a),
            blend_over_white(g, a),
            blend_over_white(b, a),
        ])
    });

    match img.color() {
        ColorType::La8 | ColorType::La16 => {
            JpegRaster::Luma(DynamicImage::ImageRgb8(flattened).into_luma8())
        }
        _ => JpegRaster::Rgb(flattened),
    }
}

fn blend_over_white(channel: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
}

fn do_mozjpeg_compression(raster: &JpegRaster, quality: Quality) -> Result<Vec<u8>> {
    let (width, height) = (raster.width() as usize, raster.height() as usize);
    let color_space = match raster {
        JpegRaster::Luma(_) => mozjpeg::ColorSpace::JCS_GRAYSCALE,
        JpegRaster::Rgb(_) => mozjpeg::ColorSpace::JCS_RGB,
    };
    let raw_data = raster.as_raw();
    let row_stride = width * raster.components();
    debug!(
        "mozjpeg: {}x{}, {} bytes, stride {}",
        width,
        height,
        raw_data.len(),
        row_stride
    );

    let mut comp = mozjpeg::Compress::new(color_space);
    comp.set_size(width, height);
    comp.set_quality(quality.get() as f32);
    comp.set_mem_dest();
    comp.start_compress();

    // 逐行写入扫描线
    for (i, row) in raw_data.chunks(row_stride).enumerate() {
        if !comp.write_scanlines(row) {
            return Err(CompressorError::CompressionError(format!(
                "MozJPEG rejected scanline {}/{}",
                i, height
            )));
        }
    }

    comp.finish_compress();
    comp.data_to_vec()
        .map_err(|e| CompressorError::CompressionError(format!("MozJPEG compression error: {:?}", e)))
}

fn do_jpeg_encoder_compression(raster: &JpegRaster, quality: Quality) -> Result<Vec<u8>> {
    // prepare_raster keeps both sides within u16
    let width = raster.width() as u16;
    let height = raster.height() as u16;
    let color_type = match raster {
        JpegRaster::Luma(_) => jpeg_encoder::ColorType::Luma,
        JpegRaster::Rgb(_) => jpeg_encoder::ColorType::Rgb,
    };

    let mut jpeg_data = Vec::with_capacity(raster.as_raw().len() / 4);
    {
        let encoder = jpeg_encoder::Encoder::new(&mut jpeg_data, quality.get());
        encoder
            .encode(raster.as_raw(), width, height, color_type)
            .map_err(|e| {
                CompressorError::CompressionError(format!("jpeg-encoder failed: {}", e))
            })?;
    }

    Ok(jpeg_data)
}

fn do_image_crate_compression(raster: &JpegRaster, quality: Quality) -> Result<Vec<u8>> {
    let mut jpeg_data = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_data, quality.get());
        encoder
            .encode(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                raster.color_type(),
            )
            .map_err(|e| CompressorError::CompressionError(format!("JPEG encoding error: {}", e)))?;
    }

    Ok(jpeg_data)
}
