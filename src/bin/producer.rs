// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Producer process: scan the collection and forward qualifying image keys

use anyhow::Result;
use std::{env, sync::Arc};
use vision_relay::{
    config::PipelineConfig, detection::HttpDetectionGateway, producer::ProducerStage,
    queue::HttpQueueGateway, source::HttpSourceEnumerator,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = PipelineConfig::from_env();
    println!("🔍 Image scan stage starting");
    println!(
        "   collection: {} | queue: {} | filter: {}",
        config.collection_id, config.queue_name, config.label_filter
    );

    let queue = Arc::new(HttpQueueGateway::new(config.queue_service_url.clone()));
    let source = Arc::new(HttpSourceEnumerator::new(config.storage_service_url.clone()));
    let detection = Arc::new(HttpDetectionGateway::new(
        config.detection_service_url.clone(),
    ));

    let stage = ProducerStage::new(queue, source, detection, config);
    match stage.run().await {
        Ok(summary) => {
            println!(
                "✅ Scan finished: {} scanned, {} forwarded, {} skipped",
                summary.scanned, summary.matched, summary.skipped
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}
