//! Structured log-message parser
//!
//! A parser is a named ordered list of regular-expression patterns applied
//! to the lines of a tailed log file. The first pattern anchors the start of
//! a message and the last pattern marks its end; lines in between fill in
//! the remaining fields. A message is admitted only when every mandatory
//! pattern matched; optional patterns left unmatched produce empty values.
//! An in-progress message that is still incomplete when a new start match
//! arrives is discarded silently.

use std::path::Path;

use pw_error::{PciewatchError, Result};
use regex::Regex;
use tracing::{debug, trace};

use crate::data::PatternConfig;
use crate::parser::tail::LogTail;

/// One captured field of a parsed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageItem {
    pub name: String,
    pub value: String,
}

/// A parsed log message: captured values in pattern order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub items: Vec<MessageItem>,
}

impl Message {
    /// Look up a captured value by pattern name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_str())
    }
}

struct CompiledPattern {
    name: String,
    regex: Regex,
    submatch_idx: usize,
    exclude: Option<Regex>,
    is_mandatory: bool,
}

/// A named parser job: compiled patterns plus tail-follow state
pub struct MessageParser {
    name: String,
    patterns: Vec<CompiledPattern>,
    start_idx: usize,
    end_idx: usize,
    tail: LogTail,
    current: Option<Vec<Option<String>>>,
}

impl MessageParser {
    pub fn new(name: &str, log_file: &Path, patterns: &[PatternConfig]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(PciewatchError::invalid_config(
                "MsgPattern",
                format!("parser \"{}\" has no patterns", name),
            ));
        }

        let compiled = patterns
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    name: p.name.clone(),
                    regex: compile(&p.regex)?,
                    submatch_idx: p.submatch_idx,
                    exclude: p.excluderegex.as_deref().map(compile).transpose()?,
                    is_mandatory: p.is_mandatory,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            start_idx: 0,
            end_idx: compiled.len() - 1,
            patterns: compiled,
            tail: LogTail::new(log_file.to_path_buf()),
            current: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consume everything appended to the log since the previous call and
    /// return the messages completed by it.
    pub fn read(&mut self, from_start: bool) -> Result<Vec<Message>> {
        let lines = self
            .tail
            .read_new_lines(from_start)
            .map_err(|source| PciewatchError::LogRead {
                path: self.tail.path().to_path_buf(),
                source,
            })?;

        let mut messages = Vec::new();
        for line in &lines {
            self.feed_line(line, &mut messages);
        }

        debug!(parser = %self.name, lines = lines.len(), messages = messages.len(), "log parser read");
        Ok(messages)
    }

    fn feed_line(&mut self, line: &str, out: &mut Vec<Message>) {
        for idx in 0..self.patterns.len() {
            let value = {
                let pattern = &self.patterns[idx];

                if let Some(exclude) = &pattern.exclude {
                    if exclude.is_match(line) {
                        trace!(parser = %self.name, pattern = %pattern.name, "line excluded");
                        continue;
                    }
                }

                match pattern.regex.captures(line) {
                    Some(caps) => caps
                        .get(pattern.submatch_idx)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    None => continue,
                }
            };

            if idx == self.start_idx {
                // A new start match flushes the current message if complete
                self.flush_current(out);
                self.current = Some(vec![None; self.patterns.len()]);
            }

            if let Some(values) = self.current.as_mut() {
                values[idx] = Some(value);
            }

            if idx == self.end_idx && self.current_complete() {
                self.flush_current(out);
            }
        }
    }

    fn current_complete(&self) -> bool {
        match &self.current {
            Some(values) => self
                .patterns
                .iter()
                .zip(values)
                .all(|(pattern, value)| !pattern.is_mandatory || value.is_some()),
            None => false,
        }
    }

    fn flush_current(&mut self, out: &mut Vec<Message>) {
        let complete = self.current_complete();
        let Some(values) = self.current.take() else { return };

        if !complete {
            debug!(parser = %self.name, "discarding incomplete message");
            return;
        }

        let items = self
            .patterns
            .iter()
            .zip(values)
            .map(|(pattern, value)| MessageItem {
                name: pattern.name.clone(),
                value: value.unwrap_or_default(),
            })
            .collect();
        out.push(Message { items });
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| PciewatchError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_patterns;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn empty_log(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("syslog");
        std::fs::write(&path, "").unwrap();
        path
    }

    fn pattern(name: &str, regex: &str, mandatory: bool) -> PatternConfig {
        PatternConfig {
            name: name.to_string(),
            regex: regex.to_string(),
            submatch_idx: 1,
            excluderegex: None,
            is_mandatory: mandatory,
        }
    }

    #[test]
    fn test_default_patterns_two_line_message() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        append(
            &log,
            "Jan 1 00:00:00 host kernel: pcieport 0000:00:1c.0: AER: Corrected error received: id=0100\n",
        );
        append(
            &log,
            " 0000:01:00.0: PCIe Bus Error: severity=Corrected, type=Data Link Layer, id=0100\n",
        );

        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.get("root port"), Some("0000:00:1c.0"));
        assert_eq!(msg.get("device"), Some("0000:01:00.0"));
        assert_eq!(msg.get("severity"), Some("Corrected"));
        assert_eq!(msg.get("error type"), Some("Data Link Layer"));
        assert_eq!(msg.get("id"), Some("0100"));
    }

    #[test]
    fn test_optional_pattern_yields_empty_value() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        append(&log, "pcieport 0000:00:1c.0: AER: error received\n");
        // No "type=...," field on the detail line
        append(&log, " 0000:01:00.0: PCIe Bus Error: severity=Fatal, id=00e0\n");

        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("error type"), Some(""));
        assert_eq!(messages[0].get("id"), Some("00e0"));
    }

    #[test]
    fn test_incomplete_message_is_discarded_on_new_start() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        // First message never gets its detail line
        append(&log, "pcieport 0000:00:1c.0: AER: error received\n");
        append(&log, "unrelated kernel chatter\n");
        append(&log, "pcieport 0000:00:1d.0: AER: error received\n");
        append(&log, " 0000:02:00.0: PCIe Bus Error: severity=Corrected, id=0200\n");

        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("root port"), Some("0000:00:1d.0"));
        assert_eq!(messages[0].get("device"), Some("0000:02:00.0"));
    }

    #[test]
    fn test_message_spanning_reads() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        append(&log, "pcieport 0000:00:1c.0: AER: error received\n");
        assert!(parser.read(false).unwrap().is_empty());

        append(&log, " 0000:01:00.0: PCIe Bus Error: severity=Corrected, id=0100\n");
        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_excluderegex_drops_line_for_slot() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let mut patterns = vec![
            pattern("start", r"begin (\w+)", true),
            pattern("detail", r"value=(\w+)", true),
        ];
        patterns[1].excluderegex = Some("ignored".to_string());
        let mut parser = MessageParser::new("custom", &log, &patterns).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        append(&log, "begin alpha\n");
        append(&log, "value=bogus ignored\n");
        append(&log, "value=real\n");

        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("detail"), Some("real"));
    }

    #[test]
    fn test_single_pattern_parser() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let patterns = vec![pattern("event", r"oops: (.*)", true)];
        let mut parser = MessageParser::new("oops", &log, &patterns).unwrap();
        assert!(parser.read(false).unwrap().is_empty());

        append(&log, "oops: first\n");
        append(&log, "nothing here\n");
        append(&log, "oops: second\n");

        let messages = parser.read(false).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].get("event"), Some("first"));
        assert_eq!(messages[1].get("event"), Some("second"));
    }

    #[test]
    fn test_missing_log_file_is_a_log_read_error() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("absent.log");
        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        assert!(matches!(
            parser.read(false),
            Err(PciewatchError::LogRead { .. })
        ));
    }

    #[test]
    fn test_first_full_read_consumes_existing_log() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        append(&log, "pcieport 0000:00:1c.0: AER: error received\n");
        append(&log, " 0000:01:00.0: PCIe Bus Error: severity=Corrected, id=0100\n");

        let mut parser = MessageParser::new("default", &log, &default_patterns()).unwrap();
        let messages = parser.read(true).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_bad_regex_fails_at_init() {
        let tmp = TempDir::new().unwrap();
        let log = empty_log(&tmp);
        let patterns = vec![pattern("bad", "(unclosed", true)];
        assert!(matches!(
            MessageParser::new("bad", &log, &patterns),
            Err(PciewatchError::InvalidRegex { .. })
        ));
    }
}
