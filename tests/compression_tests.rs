#[cfg(test)]
mod compression_tests {
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
    use img_compress::compression::{
        compress_image, AlphaPolicy, CompressionOptions, JpegAlgorithm,
    };
    use img_compress::config::Quality;
    use img_compress::errors::CompressorError;

    const ALGORITHMS: [JpegAlgorithm; 3] = [
        JpegAlgorithm::MozJpeg,
        JpegAlgorithm::JpegEncoder,
        JpegAlgorithm::Image,
    ];

    // Helper function to create a simple test image
    fn create_test_png() -> Vec<u8> {
        let mut img = ImageBuffer::<Rgb<u8>, Vec<u8>>::new(100, 100);

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let r = ((x + y) % 256) as u8;
            let g = ((x * 7) % 256) as u8;
            let b = ((y * 13) % 256) as u8;
            *pixel = Rgb([r, g, b]);
        }

        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageOutputFormat::Png)
            .expect("Failed to encode test PNG");

        buffer
    }

    fn create_transparent_png() -> Vec<u8> {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(40, 30, |x, y| {
            Rgba([(x * 5) as u8, (y * 7) as u8, 90, if x < 20 { 255 } else { 0 }])
        });

        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageOutputFormat::Png)
            .expect("Failed to encode transparent PNG");

        buffer
    }

    fn options(quality: u8, algorithm: JpegAlgorithm) -> CompressionOptions {
        CompressionOptions {
            quality: Quality::new(quality).unwrap(),
            algorithm,
            alpha_policy: AlphaPolicy::Reject,
        }
    }

    #[test]
    fn test_every_algorithm_produces_jpeg() {
        let png_data = create_test_png();

        for algorithm in ALGORITHMS {
            let (jpeg, stats) = compress_image(&png_data, &options(50, algorithm))
                .unwrap_or_else(|e| panic!("{} failed: {}", algorithm, e));

            assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
            let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (100, 100));

            assert_eq!(stats.image_width, 100);
            assert_eq!(stats.image_height, 100);
            assert_eq!(stats.original_size, png_data.len());
            assert_eq!(stats.compressed_size, jpeg.len());
            assert_eq!(stats.algorithm_used, algorithm.to_string());
        }
    }

    #[test]
    fn test_higher_quality_is_never_smaller() {
        let png_data = create_test_png();

        for algorithm in ALGORITHMS {
            let (low, _) = compress_image(&png_data, &options(1, algorithm)).unwrap();
            let (high, _) = compress_image(&png_data, &options(100, algorithm)).unwrap();
            assert!(
                high.len() >= low.len(),
                "{}: quality=100 gave {} bytes, quality=1 gave {} bytes",
                algorithm,
                high.len(),
                low.len()
            );
        }
    }

    #[test]
    fn test_jpeg_source_is_reencoded() {
        let png_data = create_test_png();
        let (jpeg, _) = compress_image(&png_data, &options(90, JpegAlgorithm::Image)).unwrap();

        let (again, stats) = compress_image(&jpeg, &options(20, JpegAlgorithm::MozJpeg)).unwrap();
        assert_eq!(image::guess_format(&again).unwrap(), ImageFormat::Jpeg);
        assert_eq!(stats.original_size, jpeg.len());
    }

    #[test]
    fn test_grayscale_source_stays_grayscale() {
        let img = ImageBuffer::from_fn(32, 32, |x, y| image::Luma([((x ^ y) * 8) as u8]));
        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageOutputFormat::Png)
            .unwrap();

        for algorithm in ALGORITHMS {
            let (jpeg, _) = compress_image(&buffer, &options(60, algorithm)).unwrap();
            let decoded = image::load_from_memory(&jpeg).unwrap();
            assert_eq!(decoded.color(), image::ColorType::L8, "{}", algorithm);
        }
    }

    #[test]
    fn test_alpha_source_rejected() {
        let png_data = create_transparent_png();

        for algorithm in ALGORITHMS {
            let result = compress_image(&png_data, &options(50, algorithm));
            assert!(
                matches!(result, Err(CompressorError::EncodingIncompatible { .. })),
                "{} accepted an alpha channel",
                algorithm
            );
        }
    }

    #[test]
    fn test_alpha_source_flattened_on_request() {
        let png_data = create_transparent_png();
        let mut opts = options(95, JpegAlgorithm::JpegEncoder);
        opts.alpha_policy = AlphaPolicy::Flatten;

        let (jpeg, stats) = compress_image(&png_data, &opts).unwrap();
        assert_eq!((stats.image_width, stats.image_height), (40, 30));

        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let corner = decoded.get_pixel(39, 29).0;
        assert!(corner.iter().all(|&c| c > 240), "transparent area not white: {:?}", corner);
    }

    #[test]
    fn test_invalid_image_data() {
        let invalid_data = vec![0; 1000];
        let result = compress_image(&invalid_data, &CompressionOptions::default());
        assert!(matches!(result, Err(CompressorError::UnsupportedFormat)));

        let empty: Vec<u8> = Vec::new();
        assert!(compress_image(&empty, &CompressionOptions::default()).is_err());
    }

    #[test]
    fn test_truncated_image_data() {
        let png_data = create_test_png();
        let truncated = &png_data[..png_data.len() / 2];

        let err = compress_image(truncated, &CompressionOptions::default()).unwrap_err();
        assert!(err.is_decode_error(), "unexpected error: {}", err);
    }
}
