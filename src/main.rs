use img_compress::{compress_with_config, Config, CompressorError};
use log::{error, info};

fn main() {
    // 配置无效时直接退出
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    // Initialize logger with configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level)
    ).init();

    info!("Starting image compressor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!("Compression failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), CompressorError> {
    let compressor_config = config.compressor_config()?;
    let report = compress_with_config(&compressor_config)?;

    if config.logging.log_compression_stats {
        let stats = &report.stats;
        info!(
            "{} -> {}: {} -> {} bytes ({:.2}% saved), {}x{}, {}, {}ms",
            report.source_path.display(),
            report.output_path.display(),
            stats.original_size,
            stats.compressed_size,
            stats.compression_ratio,
            stats.image_width,
            stats.image_height,
            stats.algorithm_used,
            stats.processing_time_ms
        );
    }

    Ok(())
}
