// In demos/spsc_perf.rs
// Two-thread throughput of the heap-backed ring.
//
// cargo run --release --example spsc_perf -- [repetitions] [capacity] [runs]
use spsc_shmqueue::SPSC::Buffer::RingBuffer;
use std::env;
use std::thread;
use std::time::Instant;

const TEST_VALUE: u32 = 777;

fn main() -> spsc_shmqueue::Result<()> {
    let args: Vec<String> = env::args().collect();
    let repetitions: u64 = args.get(1).map(|s| s.parse().expect("Invalid repetitions")).unwrap_or(100_000_000);
    let capacity: usize = args.get(2).map(|s| s.parse().expect("Invalid capacity")).unwrap_or(64 * 1024);
    let runs: u64 = args.get(3).map(|s| s.parse().expect("Invalid run count")).unwrap_or(5);

    println!("spsc_perf: {repetitions} elements per run, capacity {capacity}, {runs} runs");

    for run in 0..runs {
        let (mut producer, mut consumer) = RingBuffer::<u32>::new(capacity)?.split();

        let start = Instant::now();
        let producer_thread = thread::spawn(move || {
            for _ in 0..repetitions {
                while !producer.try_enqueue(TEST_VALUE).expect("value is not reserved") {
                    thread::yield_now();
                }
            }
        });

        let mut result = 0;
        for _ in 0..repetitions {
            result = loop {
                match consumer.try_dequeue() {
                    Some(v) => break v,
                    None => thread::yield_now(),
                }
            };
        }
        producer_thread.join().expect("producer thread panicked");

        let duration = start.elapsed();
        let ops = repetitions as f64 / duration.as_secs_f64();
        println!("{run} - ops/sec={ops:.0} - RingBuffer<u32> result={result}");
    }

    Ok(())
}
