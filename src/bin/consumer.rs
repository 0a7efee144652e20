// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Consumer process: extract text from forwarded images and write the report

use anyhow::Result;
use std::{env, sync::Arc};
use vision_relay::{
    config::PipelineConfig, consumer::ConsumerStage, detection::HttpDetectionGateway,
    queue::HttpQueueGateway, report::FileReportSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = PipelineConfig::from_env();
    println!("📝 Text extraction stage starting");
    println!(
        "   queue: {} | report: {}",
        config.queue_name, config.report_path
    );

    let queue = Arc::new(HttpQueueGateway::new(config.queue_service_url.clone()));
    let detection = Arc::new(HttpDetectionGateway::new(
        config.detection_service_url.clone(),
    ));
    let report = Arc::new(FileReportSink::new(config.report_path.clone()));

    let stage = ConsumerStage::new(queue, detection, report, config);
    match stage.run().await {
        Ok(extracted) => {
            println!("✅ Extraction finished: {} entries written", extracted.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}
