use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SourceResult;
use crate::traits::{SourceStream, StreamSource};

/// Freshness selection: serve whichever source reports the newest timestamp.
///
/// Sources without a timestamp are ignored. Ties go to the first source in
/// list order. When no source reports a timestamp there is nothing to serve.
#[derive(Default)]
pub struct MostRecent {
    sources: Vec<Box<dyn StreamSource>>,
}

impl MostRecent {
    pub fn new(sources: Vec<Box<dyn StreamSource>>) -> Self {
        Self { sources }
    }

    pub fn with(mut self, source: impl StreamSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Index and timestamp of the freshest source, scanning left to right.
    pub fn select(&self) -> SourceResult<Option<(usize, DateTime<Utc>)>> {
        let mut best: Option<(usize, DateTime<Utc>)> = None;
        for (index, source) in self.sources.iter().enumerate() {
            if !source.supports_timestamp() {
                continue;
            }
            let Some(timestamp) = source.timestamp()? else {
                continue;
            };
            match best {
                Some((_, newest)) if timestamp <= newest => {}
                _ => best = Some((index, timestamp)),
            }
        }
        Ok(best)
    }
}

impl StreamSource for MostRecent {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        match self.select()? {
            Some((index, timestamp)) => {
                let source = &self.sources[index];
                debug!(source = %source.describe(), %timestamp, "most recent selected");
                source.open()
            }
            None => Ok(None),
        }
    }

    fn supports_timestamp(&self) -> bool {
        true
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(self.select()?.map(|(_, timestamp)| timestamp))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("most-recent[{}]", parts.join(", "))
    }
}
