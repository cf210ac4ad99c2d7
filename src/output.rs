use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BatchResult, LookupResult, SearchResult, SelectResult, SessionEvent, SessionSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_lookup(result: &LookupResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_search(result: &SearchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_select(result: &SelectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_batch(result: &BatchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl SessionSink for JsonOutput {
    fn event(&self, _event: SessionEvent) {}
}
