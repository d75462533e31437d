//! Interactive session: one command per line, errors reported inline.

use std::io::{BufRead, Write};

use anyhow::{anyhow, Result};
use shipment_tracker_api::{Delivery, DeliveryCapture, Tracker};
use shipment_tracker_core::{DeliveryStatus, EditableField, StatusFilter};

use crate::render;

const PROMPT: &str = "trk> ";
const CANCEL: &str = ":cancel";
const CLEAR: &str = ":clear";

const HELP: &str = "\
Commands:
  add <TRACKING_ID>      append a tracking number
  deliver <SEQ>          mark a record delivered (asks for weight, then volume)
  edit <SEQ>             edit a record field by field
  find <TRACKING_ID>     find records by tracking number
  list [all|not-delivered|delivered]
  help                   show this text
  quit                   leave the shell

While editing, an empty line keeps the current value, :clear empties an
optional field and :cancel discards the whole edit. While delivering, an
empty line skips the measurement.
";

pub struct Shell<'a, R, W> {
    tracker: &'a mut Tracker,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(tracker: &'a mut Tracker, input: R, output: W) -> Self {
        Self { tracker, input, output }
    }

    /// Read commands until `quit` or end of input.
    ///
    /// # Errors
    /// Returns an error only when the input or output stream fails; command
    /// errors are printed and the session continues.
    pub fn run(mut self) -> Result<()> {
        writeln!(self.output, "Type `help` for the list of commands.")?;
        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                writeln!(self.output)?;
                break;
            };

            let line = line.trim();
            let (command, argument) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let argument = argument.trim();
            let outcome = match command {
                "" => Ok(()),
                "quit" | "exit" => break,
                "help" => self.output.write_all(HELP.as_bytes()).map_err(anyhow::Error::from),
                "add" => self.add(argument),
                "deliver" => self.deliver(argument),
                "edit" => self.edit(argument),
                "find" => self.find(argument),
                "list" => self.list(argument),
                other => Err(anyhow!("unknown command {other:?}; type `help`")),
            };
            if let Err(err) = outcome {
                tracing::debug!("shell command failed: {err:#}");
                writeln!(self.output, "error: {err:#}")?;
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn saved(&mut self) -> Result<()> {
        if let Some(notice) = self.tracker.take_save_notice() {
            writeln!(self.output, "{}", notice.message())?;
        }
        Ok(())
    }

    fn add(&mut self, tracking_id: &str) -> Result<()> {
        if let Some(record) = self.tracker.add(tracking_id)? {
            self.output.write_all(render::table(&[&record]).as_bytes())?;
            self.saved()?;
        }
        Ok(())
    }

    fn deliver(&mut self, argument: &str) -> Result<()> {
        let sequence_number = parse_sequence_number(argument)?;
        let index = self.tracker.record_index(sequence_number)?;
        if let Some(record) = self.tracker.records().get(index) {
            if record.status == DeliveryStatus::Delivered {
                writeln!(self.output, "{}", render::already_delivered_message(record))?;
                return Ok(());
            }
        }

        let mut capture = DeliveryCapture::new();
        while let Some(prompt) = capture.prompt() {
            writeln!(self.output, "{}", prompt.title())?;
            write!(self.output, "{} ", prompt.message())?;
            self.output.flush()?;
            match self.read_line()? {
                Some(text) => {
                    if let Err(err) = capture.answer_text(&text) {
                        writeln!(self.output, "error: {err}")?;
                    }
                }
                None => capture.answer(None),
            }
        }

        match self.tracker.deliver_captured(sequence_number, capture)? {
            Delivery::Delivered(record) => {
                self.output.write_all(render::table(&[&record]).as_bytes())?;
                self.saved()?;
            }
            Delivery::AlreadyDelivered(record) => {
                writeln!(self.output, "{}", render::already_delivered_message(&record))?;
            }
        }
        Ok(())
    }

    fn edit(&mut self, argument: &str) -> Result<()> {
        let sequence_number = parse_sequence_number(argument)?;
        let mut form = self.tracker.edit_form(sequence_number)?;

        for field in EditableField::ALL {
            write!(self.output, "{field} [{}]: ", form.value(field))?;
            self.output.flush()?;
            let Some(text) = self.read_line()? else {
                writeln!(self.output)?;
                writeln!(self.output, "Edit cancelled.")?;
                return Ok(());
            };
            match text.trim() {
                "" => {}
                CANCEL => {
                    writeln!(self.output, "Edit cancelled.")?;
                    return Ok(());
                }
                CLEAR => form.set(field, ""),
                value => form.set(field, value),
            }
        }

        if form.changes().is_empty() {
            writeln!(self.output, "No changes.")?;
            return Ok(());
        }
        let record = self.tracker.submit(&form)?;
        self.output.write_all(render::table(&[&record]).as_bytes())?;
        self.saved()
    }

    fn find(&mut self, tracking_id: &str) -> Result<()> {
        if tracking_id.is_empty() {
            return Err(anyhow!("enter a tracking number to search for"));
        }
        let records = self.tracker.find(tracking_id)?;
        if records.is_empty() {
            writeln!(self.output, "{}", render::not_found_message(tracking_id))?;
        } else {
            self.output.write_all(render::table(&records).as_bytes())?;
        }
        Ok(())
    }

    fn list(&mut self, argument: &str) -> Result<()> {
        let filter = match argument {
            "" | "all" => StatusFilter::All,
            "not-delivered" | "not_delivered" => StatusFilter::NotDelivered,
            "delivered" => StatusFilter::Delivered,
            other => return Err(anyhow!("unknown status filter {other:?}")),
        };
        let records = self.tracker.list(filter);
        self.output.write_all(render::table(&records).as_bytes())?;
        Ok(())
    }
}

fn parse_sequence_number(argument: &str) -> Result<u32> {
    argument
        .parse::<u32>()
        .map_err(|_| anyhow!("expected a record number, got {argument:?}"))
}
