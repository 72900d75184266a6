//! Flag sinks — where flagged purchases go once the detector emits them.
//!
//! RULE: the detector never formats or persists output itself. It hands
//! each complete `FlaggedPurchase` to a sink, in processing order.

use crate::{error::DetectorResult, event::FlaggedPurchase};
use std::io::Write;

/// The contract every output destination fulfills.
pub trait FlagSink {
    /// Receive one flagged purchase. Called in processing order.
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()>;

    /// Called once after the stream is exhausted.
    fn flush(&mut self) -> DetectorResult<()> {
        Ok(())
    }
}

/// Collect in memory. Used by tests and small runs.
impl FlagSink for Vec<FlaggedPurchase> {
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()> {
        self.push(flag.clone());
        Ok(())
    }
}

impl<S: FlagSink + ?Sized> FlagSink for &mut S {
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()> {
        (**self).accept(flag)
    }

    fn flush(&mut self) -> DetectorResult<()> {
        (**self).flush()
    }
}

/// Fan out to two sinks, first then second.
impl<A: FlagSink, B: FlagSink> FlagSink for (A, B) {
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()> {
        self.0.accept(flag)?;
        self.1.accept(flag)
    }

    fn flush(&mut self) -> DetectorResult<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// One JSON object per line: the original purchase fields, then
/// `mean` and `sd`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FlagSink for JsonLinesSink<W> {
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()> {
        serde_json::to_writer(&mut self.writer, flag)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> DetectorResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
