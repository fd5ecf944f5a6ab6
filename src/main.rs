//! theme-watch - 增量构建部署 watch 代理
//!
//! Usage:
//! - Normal mode: `theme-watch`
//! - Override proxy target: `theme-watch --url http://localhost:9090`
//! - Custom settings file: `theme-watch --settings ./theme-watch.json`

use std::path::PathBuf;

use theme_watch::RuntimeOptions;

/// 解析命令行参数
fn parse_args() -> RuntimeOptions {
    let args: Vec<String> = std::env::args().collect();
    let mut options = RuntimeOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                options.url_override = Some(args[i + 1].clone());
                i += 2;
            }
            "--settings" if i + 1 < args.len() => {
                options.settings_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    options
}

fn print_help() {
    println!("theme-watch - incremental build-and-deploy watch agent");
    println!();
    println!("USAGE:");
    println!("    theme-watch [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --url <URL>          Proxy target URL (overrides settings file)");
    println!("    --settings <PATH>    Path to the settings file");
    println!("    -h, --help           Print help information");
    println!();
    println!("EXAMPLES:");
    println!("    theme-watch                                  # watch with settings from theme-watch.json");
    println!("    theme-watch --url http://localhost:9090      # proxy to a different app server");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("theme_watch=info,tower_http=warn")
            }),
        )
        .init();

    let options = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let result = rt.block_on(theme_watch::init_and_run_session(options));

    if let Err(e) = result {
        tracing::error!(error = %e, "Watch session failed");
        std::process::exit(1);
    }
}
