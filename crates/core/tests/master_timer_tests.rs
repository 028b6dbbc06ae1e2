use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lumen_core::{
    shared_dmx_source, shared_function, ChannelGroup, DmxSource, EngineSettings, Function,
    FunctionStatus, GrandMaster, MasterTimer, OutputMap, OutputSink, SharedDmxSource,
    TimerEvent, UniverseArray,
};
use parking_lot::Mutex;

struct CountingSink {
    frames: Arc<AtomicUsize>,
}

impl OutputSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    fn send(&mut self, _universe: usize, _data: &[u8]) -> anyhow::Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct Steady {
    writes: Arc<AtomicUsize>,
}

impl Function for Steady {
    fn name(&self) -> &str {
        "steady"
    }

    fn write(&mut self, universes: &mut UniverseArray) -> FunctionStatus {
        self.writes.fetch_add(1, Ordering::Relaxed);
        universes.write(0, 255, ChannelGroup::Intensity);
        FunctionStatus::Running
    }
}

struct Constant(u32);

impl DmxSource for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn write_dmx(&mut self, universes: &mut UniverseArray) {
        universes.write(self.0, 1, ChannelGroup::Other);
    }
}

fn timer(frequency_hz: u32) -> (Arc<MasterTimer>, Arc<AtomicUsize>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let output = Arc::new(OutputMap::new(1, GrandMaster::default()));
    let frames = Arc::new(AtomicUsize::new(0));
    output.add_sink(Box::new(CountingSink {
        frames: Arc::clone(&frames),
    }));

    let settings = EngineSettings {
        frequency_hz,
        ..EngineSettings::default()
    };
    (Arc::new(MasterTimer::new(output, &settings)), frames)
}

#[test]
fn test_tick_count_matches_frequency() {
    let (timer, frames) = timer(50);

    let started = Instant::now();
    timer.start().unwrap();
    thread::sleep(Duration::from_secs(1));
    timer.stop();
    let elapsed = started.elapsed().as_secs_f64();

    let expected = 50.0 * elapsed;
    let ticks = timer.ticks() as f64;
    assert!(
        (ticks - expected).abs() <= expected * 0.2 + 2.0,
        "expected about {} ticks, got {}",
        expected,
        ticks
    );
    assert_eq!(frames.load(Ordering::Relaxed) as u64, timer.ticks());
}

#[test]
fn test_stop_waits_for_tick_and_is_idempotent() {
    let (timer, _) = timer(100);
    timer.stop();

    timer.start().unwrap();
    timer.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    timer.stop();
    timer.stop();

    let ticks = timer.ticks();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(timer.ticks(), ticks);
    assert!(!timer.is_running());

    // Restart after a stop keeps counting
    timer.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    timer.stop();
    assert!(timer.ticks() > ticks);
}

#[test]
fn test_concurrent_source_registration() {
    let (timer, _) = timer(200);
    timer.start().unwrap();

    let kept: Vec<SharedDmxSource> = (0..8)
        .map(|i| shared_dmx_source(Constant(i)))
        .collect();

    let workers: Vec<_> = kept
        .iter()
        .cloned()
        .map(|source| {
            let timer = Arc::clone(&timer);
            thread::spawn(move || {
                for _ in 0..200 {
                    let transient = shared_dmx_source(Constant(100));
                    timer.register_dmx_source(transient.clone());
                    timer.register_dmx_source(source.clone());
                    timer.unregister_dmx_source(&transient);
                    timer.unregister_dmx_source(&source);
                    timer.register_dmx_source(source.clone());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    timer.stop();

    assert_eq!(timer.registered_dmx_sources(), kept.len());
    for source in &kept {
        assert!(timer.is_dmx_source_registered(source));
    }
}

#[test]
fn test_functions_started_from_other_threads() {
    let (timer, _) = timer(100);
    let mut events = timer.subscribe();
    timer.start().unwrap();

    let writes = Arc::new(AtomicUsize::new(0));
    let function = shared_function(Steady {
        writes: Arc::clone(&writes),
    });

    let starters: Vec<_> = (0..4)
        .map(|_| {
            let timer = Arc::clone(&timer);
            let function = function.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    timer.start_function(function.clone());
                }
            })
        })
        .collect();
    for starter in starters {
        starter.join().unwrap();
    }

    thread::sleep(Duration::from_millis(100));
    assert_eq!(timer.running_functions(), 1);
    assert!(timer.is_function_running(&function));

    timer.fade_and_stop_all(50);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(timer.running_functions(), 0);
    assert_eq!(timer.output().grand_master().value(), 255);
    timer.stop();

    let ticks = timer.ticks() as usize;
    assert!(writes.load(Ordering::Relaxed) < ticks);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.contains(&TimerEvent::FunctionListChanged { running: 1 }));
    assert!(received.contains(&TimerEvent::FadeSequenceCompleted));
}

#[test]
fn test_stop_from_inside_a_tick() {
    struct StopOnce {
        timer: Arc<Mutex<Option<Arc<MasterTimer>>>>,
    }

    impl Function for StopOnce {
        fn name(&self) -> &str {
            "stop-once"
        }

        fn write(&mut self, _universes: &mut UniverseArray) -> FunctionStatus {
            if let Some(timer) = self.timer.lock().take() {
                timer.stop();
            }
            FunctionStatus::Finished
        }
    }

    let (timer, _) = timer(100);
    let slot = Arc::new(Mutex::new(Some(Arc::clone(&timer))));
    timer.start_function(shared_function(StopOnce {
        timer: Arc::clone(&slot),
    }));
    timer.start().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert!(!timer.is_running());
    let ticks = timer.ticks();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(timer.ticks(), ticks);
}

#[test]
fn test_concurrent_start_and_stop_events_alternate() {
    let _ = env_logger::builder().is_test(true).try_init();

    let output = Arc::new(OutputMap::new(1, GrandMaster::default()));
    let settings = EngineSettings {
        frequency_hz: 200,
        event_capacity: 4096,
        ..EngineSettings::default()
    };
    let timer = Arc::new(MasterTimer::new(output, &settings));
    let mut events = timer.subscribe();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let timer = Arc::clone(&timer);
            thread::spawn(move || {
                for _ in 0..20 {
                    timer.start().unwrap();
                    timer.stop();
                    timer.start().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut lifecycle = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            TimerEvent::Started { .. } => lifecycle.push(true),
            TimerEvent::Stopped { .. } => lifecycle.push(false),
            _ => {}
        }
    }

    assert!(!lifecycle.is_empty());
    for (index, started) in lifecycle.iter().enumerate() {
        assert_eq!(*started, index % 2 == 0, "events out of order: {:?}", lifecycle);
    }
    assert_eq!(lifecycle.last(), Some(&timer.is_running()));

    timer.stop();
    assert!(!timer.is_running());
}
