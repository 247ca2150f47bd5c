//! The file input (§4.D): exposes the tailer factory's shared line queue as
//! a lazy, conceptually infinite [`Message`] sequence.

use std::sync::{Arc, Mutex};

use futures::stream::StreamExt;
use logalike_core::{BoxMessageStream, Producer};
use logalike_message::{Message, Value};
use tokio::sync::mpsc::Receiver;
use tokio_stream::wrappers::ReceiverStream;

use crate::factory::{Line, TailerFactory};

/// Default decoder: one field, `"message"`, holding the raw line text —
/// the minimal decoding the core spec implies. Richer decoding (JSON-per-line,
/// key-value extraction) is a caller-supplied closure, not something this
/// crate parses itself.
pub fn default_line_decoder(line: &Line) -> Message {
    let mut message = Message::new();
    message.put("message", Value::String(line.text.clone()));
    message.put("source_path", Value::String(line.path.display().to_string()));
    message
}

/// A [`Producer`] that decodes every queued line into a [`Message`].
///
/// `receiver` is taken exactly once by `get`, the same one-shot discipline
/// `Aggregator::closed_stream` uses, so `FileInput` can implement the
/// `&self`-based `Producer` contract (§6) while still owning a
/// single-consumer channel.
pub struct FileInput {
    factory: Arc<TailerFactory>,
    receiver: Mutex<Option<Receiver<Line>>>,
    decode: Arc<dyn Fn(&Line) -> Message + Send + Sync>,
}

impl FileInput {
    pub fn new(factory: Arc<TailerFactory>, receiver: Receiver<Line>) -> Self {
        Self {
            factory,
            receiver: Mutex::new(Some(receiver)),
            decode: Arc::new(default_line_decoder),
        }
    }

    pub fn with_decoder(mut self, decode: impl Fn(&Line) -> Message + Send + Sync + 'static) -> Self {
        self.decode = Arc::new(decode);
        self
    }
}

impl Producer for FileInput {
    fn get(&self) -> BoxMessageStream {
        let receiver = self
            .receiver
            .lock()
            .expect("file-input receiver mutex poisoned")
            .take()
            .expect("FileInput::get called more than once");
        let decode = self.decode.clone();
        ReceiverStream::new(receiver)
            .map(move |line| decode(&line))
            .boxed()
    }

    fn close(&self) {
        self.factory.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::factory::{FactoryConfig, StartPolicy};
    use logalike_message::ValueKind;
    use std::io::Write as _;
    use tokio::time::Duration;

    #[tokio::test]
    async fn decodes_raw_lines_into_message_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::File::create(&path).unwrap().write_all(b"hello\n").unwrap();

        let (factory, receiver) = TailerFactory::new(
            FactoryConfig {
                start_policy: StartPolicy::Beginning,
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            None,
        );
        let factory = Arc::new(factory);
        factory.spawn(path.clone()).unwrap();

        let input = FileInput::new(factory.clone(), receiver);
        let mut stream = input.get();
        let message = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            message.get("message", ValueKind::String),
            Some(&Value::String("hello".into()))
        );
        factory.close();
    }
}
