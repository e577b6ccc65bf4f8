use std::io;
use std::sync::{Arc, PoisonError, RwLock};

use super::{Level, Logger, Var};

/// Fans every entry out to a list of loggers
#[derive(Default)]
pub struct MuxLogger {
    loggers: RwLock<Vec<Arc<dyn Logger>>>,
}

impl MuxLogger {
    pub fn new(loggers: Vec<Arc<dyn Logger>>) -> Self {
        Self {
            loggers: RwLock::new(loggers),
        }
    }

    /// Replace the target loggers
    pub fn set_loggers(&self, loggers: Vec<Arc<dyn Logger>>) {
        *self.loggers.write().unwrap_or_else(PoisonError::into_inner) = loggers;
    }

    pub fn loggers(&self) -> Vec<Arc<dyn Logger>> {
        self.loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Logger for MuxLogger {
    fn log(&self, level: Level, message: &str, vars: &[Var<'_>]) {
        for logger in self.loggers() {
            logger.log(level, message, vars);
        }
    }

    /// Flushes every target, returning the first failure
    fn flush(&self) -> io::Result<()> {
        let mut result = Ok(());
        for logger in self.loggers() {
            if let Err(e) = logger.flush() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn child(&self, name: &str) -> Arc<dyn Logger> {
        let children = self
            .loggers()
            .iter()
            .map(|logger| logger.child(name))
            .collect();
        Arc::new(MuxLogger::new(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::logger::StructuredLogger;
    use crate::logging::CaptureBuffer;
    use serde_json::json;

    fn target(name: &str) -> (Arc<dyn Logger>, CaptureBuffer) {
        let buffer = CaptureBuffer::new();
        let logger = StructuredLogger::new(name, &LoggerConfig::default(), buffer.clone()).unwrap();
        (Arc::new(logger), buffer)
    }

    struct FailingFlush;

    impl Logger for FailingFlush {
        fn log(&self, _level: Level, _message: &str, _vars: &[Var<'_>]) {}

        fn flush(&self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "flush failed"))
        }

        fn child(&self, _name: &str) -> Arc<dyn Logger> {
            Arc::new(FailingFlush)
        }
    }

    #[test]
    fn test_fan_out() {
        let (first, first_buf) = target("first");
        let (second, second_buf) = target("second");
        let mux = MuxLogger::new(vec![first, second]);

        mux.info_with("Mux", &[("some", json!("thing"))]);
        mux.debug(format_args!("filtered by both"));

        for buffer in [&first_buf, &second_buf] {
            let text = buffer.to_string_lossy();
            assert_eq!(text.lines().count(), 1);
            assert!(text.contains(r#""message":"Mux""#));
        }
    }

    #[test]
    fn test_set_loggers_and_child() {
        let (first, first_buf) = target("first");
        let (second, second_buf) = target("second");
        let mux = MuxLogger::default();
        mux.info(format_args!("nowhere"));

        mux.set_loggers(vec![first, second]);
        assert_eq!(mux.loggers().len(), 2);

        mux.child("worker").warn(format_args!("from child"));
        assert!(first_buf.to_string_lossy().contains(r#""name":"first.worker""#));
        assert!(second_buf.to_string_lossy().contains(r#""name":"second.worker""#));
    }

    #[test]
    fn test_flush_reports_first_error() {
        let (ok, _) = target("ok");
        let mux = MuxLogger::new(vec![ok.clone()]);
        assert!(mux.flush().is_ok());

        mux.set_loggers(vec![ok, Arc::new(FailingFlush)]);
        let err = mux.flush().unwrap_err();
        assert_eq!(err.to_string(), "flush failed");
    }
}
