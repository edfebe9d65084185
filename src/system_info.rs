use crate::config::Config;
use crate::ffmpeg::check_tool_available;
use serde::Serialize;
use sysinfo::System;

#[derive(Serialize, Debug)]
pub struct SystemInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    pub cpu_model: String,
    pub memory_total_gb: f64,
    pub memory_free_gb: f64,
    pub ffmpeg: String,
    pub ffprobe: String,
}

pub async fn get_system_info(config: &Config) -> SystemInfo {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let memory_total = system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0;
    let memory_free = system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0;

    let cpu_model = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let ffmpeg = check_tool_available(&config.media.ffmpeg_path)
        .await
        .unwrap_or_else(|_| "not available".to_string());
    let ffprobe = check_tool_available(&config.media.ffprobe_path)
        .await
        .unwrap_or_else(|_| "not available".to_string());

    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpus: system.cpus().len(),
        cpu_model,
        memory_total_gb: memory_total,
        memory_free_gb: memory_free,
        ffmpeg,
        ffprobe,
    }
}

pub fn print_startup_info(config: &Config, sys_info: &SystemInfo) {
    println!("{}", "=".repeat(60));
    println!("🚀 Video Upload Backend v{}", sys_info.version);
    println!("{}", "=".repeat(60));
    println!("📊 Runtime Environment:");
    println!("  Platform: {} ({})", sys_info.platform, sys_info.arch);
    println!("  CPUs: {} ({})", sys_info.cpus, sys_info.cpu_model);
    println!(
        "  Memory: {:.2} GB total, {:.2} GB available",
        sys_info.memory_total_gb, sys_info.memory_free_gb
    );
    println!("  FFmpeg: {}", sys_info.ffmpeg);
    println!("  FFprobe: {}", sys_info.ffprobe);
    println!("  Scratch Dir: {:?}", config.scratch_dir);
    println!(
        "  Bucket: {} ({})",
        config.storage.bucket, config.storage.region
    );
    if let Some(endpoint) = &config.storage.endpoint_url {
        println!("  Endpoint: {}", endpoint);
    }
    println!(
        "  Max Upload: {} MB, Presign TTL: {}s",
        config.max_upload_size / 1024 / 1024,
        config.storage.presign_ttl.as_secs()
    );
    println!("{}", "=".repeat(60));
}
