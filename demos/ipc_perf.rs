// In demos/ipc_perf.rs
// Cross-process throughput over a file-backed ring. Start the consumer and
// the producer in two terminals, in either order:
//
// cargo run --release --example ipc_perf -- c
// cargo run --release --example ipc_perf -- p [repetitions] [capacity] [runs]
//
// Both sides must be given the same repetitions, capacity and runs.
use spsc_shmqueue::SPSC::{ChannelBuilder, Consumer, Producer, RunBarrier};
use spsc_shmqueue::RetryPolicy;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn main() -> spsc_shmqueue::Result<()> {
    let args: Vec<String> = env::args().collect();
    let role = match args.get(1).map(|s| s.to_ascii_lowercase()) {
        Some(r) if r == "p" || r == "c" => r,
        _ => {
            eprintln!("Usage: {} <p|c> [repetitions] [capacity] [runs]", args[0]);
            std::process::exit(1);
        }
    };
    let repetitions: u64 = args.get(2).map(|s| s.parse().expect("Invalid repetitions")).unwrap_or(50_000_000);
    let capacity: usize = args.get(3).map(|s| s.parse().expect("Invalid capacity")).unwrap_or(32 * 1024);
    let runs: u64 = args.get(4).map(|s| s.parse().expect("Invalid run count")).unwrap_or(20);

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_for_handler = Arc::clone(&keep_running);

    // Handle Ctrl+C to stop between runs
    ctrlc::set_handler(move || {
        keep_running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let builder = ChannelBuilder::new()
        .with_capacity(capacity)
        .with_barrier_policy(RetryPolicy::yielding());

    if role == "p" {
        println!("Producer: creating {}", builder.path().display());
        let (mut producer, barrier) = builder.build_producer::<u32>()?;
        for run in 0..runs {
            if !keep_running.load(Ordering::SeqCst) {
                break;
            }
            producer_run(run, repetitions, &mut producer, &barrier)?;
        }
        println!("Producer: Shutting down");
    } else {
        println!("Consumer: waiting for {}", builder.path().display());
        let (mut consumer, barrier) = builder.build_consumer::<u32>()?;
        for run in 0..runs {
            if !keep_running.load(Ordering::SeqCst) {
                break;
            }
            consumer_run(run, repetitions, &mut consumer, &barrier)?;
        }
        println!("Consumer: Shutting down");
    }

    Ok(())
}

fn producer_run(run: u64, repetitions: u64, producer: &mut Producer<u32>, barrier: &RunBarrier) -> spsc_shmqueue::Result<()> {
    barrier.begin_run(run)?;
    let start = Instant::now();
    for i in (1..=repetitions).rev() {
        while !producer.try_enqueue((i & 31) as u32)? {
            std::hint::spin_loop();
        }
    }
    barrier.mark_sent(run)?;
    barrier.await_acknowledged(run)?;

    let duration = start.elapsed();
    let ops = repetitions as f64 / duration.as_secs_f64();
    println!("{run} - ops/sec={ops:.0} - Producer<u32> size={}", producer.size());
    Ok(())
}

fn consumer_run(run: u64, repetitions: u64, consumer: &mut Consumer<u32>, barrier: &RunBarrier) -> spsc_shmqueue::Result<()> {
    barrier.begin_run(run)?;
    for i in (1..=repetitions).rev() {
        let value = loop {
            if let Some(v) = consumer.try_dequeue() {
                break v;
            }
            std::hint::spin_loop();
        };
        assert_eq!(value, (i & 31) as u32, "Consumer: run {run} out of order");
    }
    barrier.acknowledge(run)?;
    println!("{run} - received {repetitions} elements");
    Ok(())
}
