use std::io::Write;

use crate::events::Event;

/// Reporter aggregates events and produces human or JSON output.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
        }
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            let written = serde_json::to_string(&event)
                .map_err(std::io::Error::from)
                .and_then(|line| writeln!(std::io::stdout().lock(), "{line}"));
            if let Err(e) = written {
                tracing::warn!(error = %e, "failed to emit event");
            }
        }
        self.events.push(event);
    }

    /// A line meant for a person; JSON mode carries it inside an event instead.
    pub fn message(&self, line: &str) {
        if !self.json_mode {
            println!("{}", line);
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn summary(&self) -> String {
        let mut parsed = 0;
        let mut written = None;
        for event in &self.events {
            match event {
                Event::ChangelogParsed { change_sets, .. } => parsed = *change_sets,
                Event::OutputWritten {
                    target, change_sets, ..
                } => written = Some((target, *change_sets)),
                _ => {}
            }
        }
        match written {
            Some((target, kept)) => format!(
                "{kept} of {parsed} changesets written to {}",
                target.display()
            ),
            None => format!("{} events recorded, nothing written", self.events.len()),
        }
    }
}
