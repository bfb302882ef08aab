use crate::domain::attempt::AttemptLogEntry;
use crate::error::StoreError;
use std::io::Write;

/// Dumps the attempt log as CSV, one row per attempt.
pub struct AttemptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AttemptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_attempts<I>(&mut self, attempts: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = AttemptLogEntry>,
    {
        for entry in attempts {
            self.writer.serialize(entry)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
