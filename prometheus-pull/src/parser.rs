//! Prometheus text exposition format decoder.
//!
//! See <https://prometheus.io/docs/instrumenting/exposition_formats/>.
//!
//! Every line is classified, in this order, as blank, `# HELP`, `# TYPE`,
//! comment, metric sample or unsupported. Only metric lines produce output.
//! `# TYPE` declarations are remembered for the rest of the body being
//! decoded and are attached to the samples that follow them.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

use regex::{Captures, Regex};

use crate::error::{ConfigError, DecodeError, Result};
use crate::record::{Labels, MetricSample};

/// Default entry delimiter.
pub const DEFAULT_DELIMITER: &str = "\n";
/// Default prefix applied to label keys.
pub const DEFAULT_LABEL_PREFIX: &str = "";

const EMPTY_PATTERN: &str = r"^\s*$";
const HELP_PATTERN: &str = r"^#\sHELP\s(?P<name>\w+)\s(?P<doc>.*)$";
const TYPE_PATTERN: &str = r"^#\sTYPE\s(?P<name>\w+)\s(?P<type>\w+)";
const COMMENT_PATTERN: &str = r"^#";
const METRIC_PATTERN: &str = r"^(?P<name>\w+)(?:\s*\{(?P<labels>.*)\})?\s+(?P<value>NaN|[+-]Inf|[-+]?[0-9.]+(?:[eE][-+]?[0-9]+)?)(?:\s+(?P<timestamp>-?[0-9]+))?\s*$";

/// Decoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Separator between entries.
    pub delimiter: String,
    /// Prefix prepended to every label key.
    pub label_prefix: String,
    /// Attach the declared metric type to each sample.
    pub add_type: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            add_type: true,
        }
    }
}

/// Counters from one decode call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    /// Samples handed to the callback.
    pub samples: usize,
    /// Lines skipped as undecodable.
    pub skipped: usize,
}

/// Decoder for the Prometheus text exposition format.
#[derive(Debug, Clone)]
pub struct PrometheusTextParser {
    config: ParserConfig,
    empty_re: Regex,
    help_re: Regex,
    type_re: Regex,
    comment_re: Regex,
    metric_re: Regex,
}

/// What a single line turned out to be.
enum Entry<'a> {
    Ignored,
    Type { name: &'a str, metric_type: &'a str },
    Sample(MetricSample),
}

impl PrometheusTextParser {
    /// Build a decoder. Fails if the delimiter is empty.
    pub fn new(config: ParserConfig) -> Result<Self> {
        if config.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }

        Ok(Self {
            config,
            empty_re: Regex::new(EMPTY_PATTERN)?,
            help_re: Regex::new(HELP_PATTERN)?,
            type_re: Regex::new(TYPE_PATTERN)?,
            comment_re: Regex::new(COMMENT_PATTERN)?,
            metric_re: Regex::new(METRIC_PATTERN)?,
        })
    }

    /// Options this decoder was built with.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Decode a body, calling `on_sample` with `(timestamp, sample)` for
    /// every metric line.
    ///
    /// Undecodable lines are logged and skipped; decoding always runs to the
    /// end of the input.
    pub fn parse<F>(&self, text: &str, mut on_sample: F) -> ParseStats
    where
        F: FnMut(Option<i64>, MetricSample),
    {
        let mut types: HashMap<String, String> = HashMap::new();
        let mut stats = ParseStats::default();

        for line in text.split(self.config.delimiter.as_str()) {
            match self.decode_line(line) {
                Ok(Entry::Ignored) => {}
                Ok(Entry::Type { name, metric_type }) => {
                    types.insert(name.to_string(), metric_type.to_string());
                }
                Ok(Entry::Sample(mut sample)) => {
                    if self.config.add_type {
                        match types.get(&sample.name) {
                            Some(metric_type) => sample.metric_type = Some(metric_type.clone()),
                            None => {
                                tracing::warn!(metric = %sample.name, "missing metric type")
                            }
                        }
                    }
                    stats.samples += 1;
                    on_sample(sample.timestamp, sample);
                }
                Err(e) => {
                    stats.skipped += 1;
                    tracing::error!(error = %e, "Skipping exposition line");
                }
            }
        }

        stats
    }

    /// Decode a body into a vector of `(timestamp, sample)` pairs.
    pub fn parse_to_vec(&self, text: &str) -> Vec<(Option<i64>, MetricSample)> {
        let mut samples = Vec::new();
        self.parse(text, |ts, sample| samples.push((ts, sample)));
        samples
    }

    fn decode_line<'a>(&self, line: &'a str) -> std::result::Result<Entry<'a>, DecodeError> {
        if self.empty_re.is_match(line) || self.help_re.is_match(line) {
            return Ok(Entry::Ignored);
        }
        if let Some(caps) = self.type_re.captures(line) {
            return match (caps.name("name"), caps.name("type")) {
                (Some(name), Some(metric_type)) => Ok(Entry::Type {
                    name: name.as_str(),
                    metric_type: metric_type.as_str(),
                }),
                _ => Ok(Entry::Ignored),
            };
        }
        if self.comment_re.is_match(line) {
            return Ok(Entry::Ignored);
        }
        match self.metric_re.captures(line) {
            Some(caps) => self.build_sample(&caps).map(Entry::Sample),
            None => Err(DecodeError::UnsupportedLine(line.to_string())),
        }
    }

    fn build_sample(&self, caps: &Captures<'_>) -> std::result::Result<MetricSample, DecodeError> {
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let raw_value = caps.name("value").map(|m| m.as_str()).unwrap_or_default();

        let mut sample = MetricSample::new(name, convert_metric_value(raw_value)?);

        if let Some(block) = caps.name("labels") {
            sample.labels = parse_labels(block.as_str(), &self.config.label_prefix)?;
        }

        if let Some(raw_ts) = caps.name("timestamp") {
            let ts = raw_ts
                .as_str()
                .parse::<i64>()
                .map_err(|_| DecodeError::InvalidTimestamp(raw_ts.as_str().to_string()))?;
            sample.timestamp = Some(ts);
        }

        Ok(sample)
    }
}

/// Convert a value token to a float.
fn convert_metric_value(raw: &str) -> std::result::Result<f64, DecodeError> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|_| DecodeError::InvalidValue(other.to_string())),
    }
}

/// Parse the inside of a `{...}` label block.
fn parse_labels(block: &str, prefix: &str) -> std::result::Result<Labels, DecodeError> {
    let mut labels = Labels::new();
    let mut chars = block.char_indices().peekable();

    let malformed = |offset: usize| DecodeError::MalformedLabels {
        block: block.to_string(),
        offset,
    };

    loop {
        skip_whitespace(&mut chars);
        let Some(&(start, _)) = chars.peek() else {
            break;
        };

        let mut key = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                key.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if key.is_empty() {
            return Err(malformed(start));
        }

        skip_whitespace(&mut chars);
        expect_char(&mut chars, '=').map_err(|pos| malformed(pos.unwrap_or(block.len())))?;
        skip_whitespace(&mut chars);
        expect_char(&mut chars, '"').map_err(|pos| malformed(pos.unwrap_or(block.len())))?;

        let value = scan_quoted(&mut chars).ok_or_else(|| malformed(block.len()))?;
        labels.insert(format!("{}{}", prefix, key), value);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some((_, ',')) => continue,
            Some((pos, _)) => return Err(malformed(pos)),
        }
    }

    Ok(labels)
}

fn skip_whitespace(chars: &mut Peekable<CharIndices<'_>>) {
    while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
}

/// Consume `expected`, or report the offset of what was found instead.
fn expect_char(
    chars: &mut Peekable<CharIndices<'_>>,
    expected: char,
) -> std::result::Result<(), Option<usize>> {
    match chars.next() {
        Some((_, c)) if c == expected => Ok(()),
        Some((pos, _)) => Err(Some(pos)),
        None => Err(None),
    }
}

/// Read a label value up to its closing unescaped quote.
///
/// `\"`, `\\` and `\n` are unescaped; any other escape is kept verbatim.
/// Returns `None` if the closing quote is missing.
fn scan_quoted(chars: &mut Peekable<CharIndices<'_>>) -> Option<String> {
    let mut value = String::new();

    while let Some((_, c)) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => match chars.next() {
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return None,
            },
            other => value.push(other),
        }
    }

    None
}
