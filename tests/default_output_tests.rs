// Only test in this binary: it changes the process working directory.
#[cfg(test)]
mod default_output_tests {
    use image::{ImageBuffer, ImageFormat, Rgb};
    use img_compress::compression::compress;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compress_writes_fixed_output_name() {
        let dir = TempDir::new().unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(20, 20, |x, y| {
            Rgb([(x * 12) as u8, (y * 12) as u8, 200])
        });
        img.save("image.jpg").unwrap();

        let first = compress("image.jpg", 50);
        let second = compress("image.jpg", 5);
        let entries: Vec<_> = fs::read_dir(".")
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        let bytes = fs::read("compressed_image.jpg");

        std::env::set_current_dir(previous).unwrap();

        let first = first.unwrap();
        assert_eq!(
            first.confirmation_message(),
            "Image saved as compressed_image.jpg with quality=50"
        );
        let second = second.unwrap();
        assert_eq!(second.quality.get(), 5);

        let bytes = bytes.unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(bytes.len(), second.stats.compressed_size);

        let mut entries = entries;
        entries.sort();
        assert_eq!(entries, vec!["compressed_image.jpg", "image.jpg"]);
    }
}
