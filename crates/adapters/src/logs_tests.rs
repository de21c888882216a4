// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quarry_core::Job;

#[tokio::test]
async fn memory_sink_captures_per_job() {
    let factory = MemorySinkFactory::new();
    let job_a = Job::builder().job_id("a").build();
    let job_b = Job::builder().job_id("b").build();

    let mut sink_a = factory.open(&job_a).await.unwrap();
    let mut sink_b = factory.open(&job_b).await.unwrap();

    sink_a.write(b"from a\n").await.unwrap();
    sink_b.write(b"from b\n").await.unwrap();
    sink_a.write(b"more a\n").await.unwrap();
    sink_a.close().await.unwrap();

    assert_eq!(factory.output_for("a").unwrap(), "from a\nmore a\n");
    assert_eq!(factory.output_for("b").unwrap(), "from b\n");
    assert!(factory.closed_for("a"));
    assert!(!factory.closed_for("b"));
    assert!(factory.output_for("c").is_none());
}

#[tokio::test]
async fn console_factory_opens_sink() {
    let factory = ConsoleSinkFactory;
    let job = Job::builder().build();
    let mut sink = factory.open(&job).await.unwrap();
    sink.write(b"").await.unwrap();
    sink.close().await.unwrap();
}
