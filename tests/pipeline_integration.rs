//! Exercises the wiring of several crates together end-to-end: a real file
//! tailer feeding a repetition processor through a `PipelineRuntime` into a
//! recording consumer. Unit tests colocated with each module already cover
//! each component in isolation (§8's scenarios); this mirrors the teacher's
//! `tests/` convention for anything spanning more than one file.

use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logalike::{
    Chain, Clock, Consumer, FactoryConfig, FileInput, Message, PipelineRuntime, Producer,
    RepetitionConfig, RepetitionProcessor, StartPolicy, SystemClock, TailerFactory, Value,
};

struct RecordingConsumer {
    accepted: Mutex<Vec<Message>>,
}

#[async_trait::async_trait]
impl Consumer for RecordingConsumer {
    async fn accept(&self, message: Message) {
        self.accepted.lock().unwrap().push(message);
    }
}

fn body_of(m: &Message) -> Option<String> {
    m.get_raw("message").and_then(|v| v.as_str()).map(str::to_string)
}

#[tokio::test]
async fn tailed_lines_flow_through_repetition_to_the_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"boot\nboot\nboot\nready\n")
        .unwrap();

    let (factory, receiver) = TailerFactory::new(
        FactoryConfig {
            start_policy: StartPolicy::Beginning,
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
        None,
    );
    let factory = Arc::new(factory);
    factory.spawn(path).unwrap();

    let producer: Arc<dyn Producer> = Arc::new(FileInput::new(factory.clone(), receiver));
    let consumer = Arc::new(RecordingConsumer {
        accepted: Mutex::new(Vec::new()),
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repetition = Arc::new(RepetitionProcessor::new(
        RepetitionConfig {
            window_duration: Duration::from_millis(150),
            fingerprint: Arc::new(|m: &Message| body_of(m).unwrap_or_default()),
        },
        clock,
    ));
    let chain = Chain::new().then(repetition.clone());
    let runtime = Arc::new(PipelineRuntime::new(chain));

    let run_runtime = runtime.clone();
    let run_producer = producer.clone();
    let run_consumer: Arc<dyn Consumer> = consumer.clone();
    let handle = tokio::spawn(async move { run_runtime.run(run_producer, run_consumer).await });

    // Let the tailer read all four lines and the pass-through side annotate
    // each of them, then let the window close so the aggregate side fires.
    tokio::time::sleep(Duration::from_millis(400)).await;

    runtime.close(producer.as_ref(), consumer.as_ref()).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

    let accepted = consumer.accepted.lock().unwrap();
    let pass_through_count = accepted
        .iter()
        .filter(|m| matches!(m.get_raw("repeatCount"), Some(Value::Integer(0))))
        .count();
    assert_eq!(pass_through_count, 4, "every tailed line gets a pass-through annotation");

    let boot_aggregate = accepted
        .iter()
        .find(|m| body_of(m).as_deref() == Some("boot") && m.get_raw("repeatCount") != Some(&Value::Integer(0)));
    let boot_aggregate = boot_aggregate.expect("closed-window aggregate for the repeated line");
    assert_eq!(boot_aggregate.get_raw("isRepeated"), Some(&Value::Boolean(true)));
    assert_eq!(boot_aggregate.get_raw("repeatCount"), Some(&Value::Integer(3)));
}
