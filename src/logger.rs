// ABOUTME: Logging capability handed to the Context by the embedder

/// Destination for diagnostic output.
pub trait LogSink {
    fn log(&self, message: &str);
}

/// Default sink: forward to the `tracing` subscriber installed by the host.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::debug!(target: "parenvm", "{}", message);
    }
}

/// Sink used by the REPL so toggled logging is visible without a subscriber.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn log(&self, message: &str) {
        println!("{}", message);
    }
}

/// Logging switches for the three pipeline stages plus a sink.
pub struct Logger {
    pub parsing: bool,
    pub instructions: bool,
    pub stack: bool,
    sink: Box<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Logger {
            parsing: false,
            instructions: false,
            stack: false,
            sink,
        }
    }

    /// All switches off, output to `tracing`.
    pub fn quiet() -> Self {
        Logger::new(Box::new(TracingSink))
    }

    pub fn log(&self, message: &str) {
        self.sink.log(message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("parsing", &self.parsing)
            .field("instructions", &self.instructions)
            .field("stack", &self.stack)
            .finish()
    }
}
