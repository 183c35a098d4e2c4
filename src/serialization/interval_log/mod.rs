//! Interval log parsing and writing.
//!
//! Interval logs, as handled by the Java implementation's `HistogramLogWriter` and
//! `HistogramLogReader`, are a way to record a sequence of histograms over time. Suppose you were
//! running a load test for an hour: you might want to record a histogram per second or minute so
//! that you could correlate measurements with behavior you might see in logs, etc.
//!
//! A log is plain text. Lines starting with `#` are comments, some of which carry metadata; a
//! legend line names the columns; every other line holds one interval:
//!
//! ```text
//! #[Histogram log format version 1.3]
//! #[StartTime: 1500000040 (seconds since epoch), 2017-07-14T02:40:40+00:00]
//! "StartTimestamp","Interval_Length","Interval_Max","Interval_Compressed_Histogram"
//! Tag=db,0.127,1.007,2.769,HISTFAAAAEV42pNpmSzMwMCgyAABTBDKT4GBgdnNYMcCBvsPEBEJISEuATEZMQ...
//! ```
//!
//! The interval columns are the start of the interval in seconds, its length in seconds, the
//! maximum value (divided by an optional divisor, for human consumption only) and the histogram
//! itself, V2 compressed and base64 encoded.
//!
//! # Timestamps
//!
//! Interval start timestamps may be absolute (seconds since the epoch) or relative to a BaseTime.
//! A `#[BaseTime: ...]` header makes them relative to that time. Without one, the reader guesses:
//! timestamps more than a year before the StartTime are taken to be relative to the StartTime,
//! anything else is taken to be absolute. StartTime itself records when the process reached its
//! "start" condition, and defaults to the first interval's timestamp.
//!
//! The reader puts absolute start and end times, in milliseconds, on every histogram it returns.
//!
//! ```
//! use hdrwindow::Histogram;
//! use hdrwindow::serialization::interval_log::{HistogramLogReader, HistogramLogWriter};
//!
//! let mut writer = HistogramLogWriter::new(Vec::new());
//! writer.output_log_format_version().unwrap();
//! writer.output_start_time(1_500_000_000_000).unwrap();
//! writer.output_legend().unwrap();
//!
//! let mut h = Histogram::<u64>::new(1, 1000, 3).unwrap();
//! h.record(42).unwrap();
//! h.set_start_time_ms(1_500_000_000_000);
//! h.set_end_time_ms(1_500_000_001_000);
//! writer.output_interval_histogram(&h).unwrap();
//!
//! let log = writer.into_inner();
//! let mut reader = HistogramLogReader::new(log.as_slice());
//! let read: Histogram<u64> = reader.next_interval_histogram().unwrap().unwrap();
//! assert_eq!(1, read.total_count());
//! assert_eq!(1_500_000_001_000, read.end_time_ms());
//! assert!(reader.next_interval_histogram::<u64>().unwrap().is_none());
//! ```

use std::error::Error;
use std::fmt::Write as FmtWrite;
use std::{fmt, io, ops, str};

use chrono::{SecondsFormat, TimeZone, Utc};
use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_until, take_while1};
use nom::character::complete::char;
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::error::ErrorKind;
use nom::number::complete::double;
use nom::IResult;
use tracing::{debug, trace};

use super::{DeserializeError, Deserializer, EncodeError, Serializer, V2DeflateSerializer};
use crate::{Counter, Histogram};

const LOG_FORMAT_VERSION: &str = "1.3";

const LEGEND: &str =
    "\"StartTimestamp\",\"Interval_Length\",\"Interval_Max\",\"Interval_Compressed_Histogram\"";

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Errors that can occur while writing a log.
#[derive(Debug)]
pub enum LogWriteError {
    /// The histogram's tag contains a character that cannot appear in a log (',', ' ', '\r' or
    /// '\n').
    InvalidTag,
    /// Histogram serialization failed.
    Encode(EncodeError),
    /// An i/o error occurred.
    IoError(io::Error),
}

impl From<io::Error> for LogWriteError {
    fn from(e: io::Error) -> Self {
        LogWriteError::IoError(e)
    }
}

impl From<EncodeError> for LogWriteError {
    fn from(e: EncodeError) -> Self {
        LogWriteError::Encode(e)
    }
}

impl fmt::Display for LogWriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogWriteError::InvalidTag => write!(f, "The histogram tag cannot be written to a log"),
            LogWriteError::Encode(e) => write!(f, "Histogram serialization failed: {}", e),
            LogWriteError::IoError(e) => write!(f, "An i/o error occurred: {}", e),
        }
    }
}

impl Error for LogWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LogWriteError::InvalidTag => None,
            LogWriteError::Encode(e) => Some(e),
            LogWriteError::IoError(e) => Some(e),
        }
    }
}

/// Errors that can occur while reading a log.
///
/// Reading cannot continue after an error: the reader does not try to find its way back to a
/// valid line.
#[derive(Debug)]
pub enum LogReadError {
    /// A line is neither a comment, the legend nor a valid interval.
    Parse {
        /// 1-based line number.
        line: usize,
    },
    /// An interval line holds a histogram that could not be decoded.
    Decode {
        /// 1-based line number.
        line: usize,
        /// Why decoding failed.
        source: DeserializeError,
    },
    /// An i/o error occurred.
    IoError(io::Error),
}

impl From<io::Error> for LogReadError {
    fn from(e: io::Error) -> Self {
        LogReadError::IoError(e)
    }
}

impl fmt::Display for LogReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogReadError::Parse { line } => write!(f, "Invalid log line {}", line),
            LogReadError::Decode { line, source } => {
                write!(f, "Invalid histogram on log line {}: {}", line, source)
            }
            LogReadError::IoError(e) => write!(f, "An i/o error occurred: {}", e),
        }
    }
}

impl Error for LogReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LogReadError::Parse { .. } => None,
            LogReadError::Decode { source, .. } => Some(source),
            LogReadError::IoError(e) => Some(e),
        }
    }
}

/// A tag for an interval histogram.
///
/// Tags are just `str`s that do not contain a few disallowed characters: ',', '\r', '\n', and ' '.
///
/// To get the wrapped `str` back out, use `as_str()` or the `Deref<str>` implementation
/// (`&some_tag`).
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Tag<'a>(&'a str);

impl<'a> Tag<'a> {
    /// Create a new Tag.
    ///
    /// If a disallowed character is present, this will return `None`.
    pub fn new(s: &'a str) -> Option<Tag<'a>> {
        if s.chars().any(|c| c == ',' || c == '\r' || c == '\n' || c == ' ') {
            None
        } else {
            Some(Tag(s))
        }
    }

    /// Returns the tag contents as a str.
    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> ops::Deref for Tag<'a> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

/// Writes an interval log.
///
/// The header lines are all optional and written on request; a typical log starts with
/// `output_log_format_version`, `output_start_time` and `output_legend`, followed by one
/// `output_interval_histogram` per interval.
pub struct HistogramLogWriter<W: io::Write> {
    writer: W,
    serializer: V2DeflateSerializer,
    serialize_buf: Vec<u8>,
    text_buf: String,
    base_time_ms: i64,
    max_value_divisor: f64,
}

impl<W: io::Write> HistogramLogWriter<W> {
    /// Create a new log writer that writes to `writer`.
    pub fn new(writer: W) -> HistogramLogWriter<W> {
        HistogramLogWriter {
            writer,
            serializer: V2DeflateSerializer::new(),
            serialize_buf: Vec::new(),
            text_buf: String::new(),
            base_time_ms: 0,
            max_value_divisor: 1.0,
        }
    }

    /// Write the log format version banner.
    pub fn output_log_format_version(&mut self) -> io::Result<()> {
        writeln!(
            self.writer,
            "#[Histogram log format version {}]",
            LOG_FORMAT_VERSION
        )
    }

    /// Write a StartTime header, `epoch_ms` being milliseconds since the epoch.
    pub fn output_start_time(&mut self, epoch_ms: i64) -> io::Result<()> {
        let calendar = Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, false))
            .unwrap_or_default();
        writeln!(
            self.writer,
            "#[StartTime: {} (seconds since epoch), {}]",
            epoch_ms / 1000,
            calendar
        )
    }

    /// Write a BaseTime header, `epoch_ms` being milliseconds since the epoch.
    ///
    /// This only writes the header. Use `set_base_time_ms` to make the interval timestamps
    /// relative to it.
    pub fn output_base_time(&mut self, epoch_ms: i64) -> io::Result<()> {
        writeln!(
            self.writer,
            "#[BaseTime: {:.3} (seconds since epoch)]",
            epoch_ms as f64 / 1000.0
        )
    }

    /// Write a comment line.
    ///
    /// Comments containing '\n' will be transformed into multiple lines of comments.
    pub fn output_comment(&mut self, s: &str) -> io::Result<()> {
        for l in s.split('\n') {
            writeln!(self.writer, "#{}", l)?;
        }
        Ok(())
    }

    /// Write the legend line.
    pub fn output_legend(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{}", LEGEND)
    }

    /// Write one interval line for `h`.
    ///
    /// The interval is taken from the histogram's start and end times; the start is written
    /// relative to the base time (0 unless set with `set_base_time_ms`). A tag on the histogram
    /// is written too.
    pub fn output_interval_histogram<T: Counter>(&mut self, h: &Histogram<T>) -> Result<(), LogWriteError> {
        let tag = match h.tag() {
            Some(t) if !t.is_empty() => Some(Tag::new(t).ok_or(LogWriteError::InvalidTag)?),
            _ => None,
        };

        self.serialize_buf.clear();
        self.text_buf.clear();
        let _ = self.serializer.serialize(h, &mut self.serialize_buf)?;

        if let Some(Tag(s)) = tag {
            // writes to a String can't fail
            let _ = write!(self.text_buf, "Tag={},", s);
        }
        let _ = write!(
            self.text_buf,
            "{:.3},{:.3},{:.3},",
            (h.start_time_ms() - self.base_time_ms) as f64 / 1000.0,
            (h.end_time_ms() - h.start_time_ms()) as f64 / 1000.0,
            h.max() as f64 / self.max_value_divisor
        );
        base64::encode_config_buf(&self.serialize_buf, base64::STANDARD, &mut self.text_buf);
        self.text_buf.push('\n');

        self.writer.write_all(self.text_buf.as_bytes())?;
        Ok(())
    }

    /// Base time that interval start times are written relative to, in milliseconds since the
    /// epoch.
    pub fn base_time_ms(&self) -> i64 {
        self.base_time_ms
    }

    /// Set the base time that interval start times are written relative to.
    pub fn set_base_time_ms(&mut self, epoch_ms: i64) {
        self.base_time_ms = epoch_ms;
    }

    /// Set a max value divisor.
    ///
    /// This is used to scale down the max value part of an interval log to something that may be
    /// more human readable. The max value in the log is only for human consumption, so you might
    /// prefer to divide by 10<sup>9</sup> to turn nanoseconds into fractional seconds, for
    /// instance.
    ///
    /// If this is not set, 1.0 will be used.
    pub fn set_max_value_divisor(&mut self, max_value_divisor: f64) {
        self.max_value_divisor = max_value_divisor;
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> W {
        // the writer is handed back either way; a failed flush resurfaces on its next write
        let _ = self.writer.flush();
        self.writer
    }
}

/// Reads the histograms back out of an interval log, one line at a time.
///
/// Histograms are decoded as they are reached, so memory use does not grow with the log. Headers
/// are picked up as they are passed: see the module documentation for how StartTime and
/// BaseTime affect the timestamps put on each histogram.
pub struct HistogramLogReader<R: io::BufRead> {
    reader: R,
    line_number: usize,
    deserializer: Deserializer,
    decode_buf: Vec<u8>,
    start_time_sec: Option<f64>,
    base_time_sec: Option<f64>,
    range_observed_min: Option<i64>,
    range_observed_max: Option<i64>,
}

impl<R: io::BufRead> HistogramLogReader<R> {
    /// Create a reader for the log in `reader`.
    pub fn new(reader: R) -> HistogramLogReader<R> {
        HistogramLogReader {
            reader,
            line_number: 0,
            deserializer: Deserializer::new(),
            decode_buf: Vec::new(),
            start_time_sec: None,
            base_time_sec: None,
            range_observed_min: None,
            range_observed_max: None,
        }
    }

    /// Read the next interval histogram.
    ///
    /// Returns `Ok(None)` at the end of the log. After an error, no further histograms should be
    /// read.
    pub fn next_interval_histogram<T: Counter>(&mut self) -> Result<Option<Histogram<T>>, LogReadError> {
        self.next_interval_histogram_in_range(0.0, f64::MAX, true)
    }

    /// Read the next interval histogram whose start falls in `[start_sec, end_sec]`.
    ///
    /// With `absolute`, the range is in seconds since the epoch; otherwise it is in seconds since
    /// the log's StartTime. Intervals before the range are skipped. Reaching an interval after
    /// the range returns `Ok(None)`, as does the end of the log.
    pub fn next_interval_histogram_in_range<T: Counter>(
        &mut self,
        start_sec: f64,
        end_sec: f64,
        absolute: bool,
    ) -> Result<Option<Histogram<T>>, LogReadError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if text.trim().is_empty() {
                continue;
            }

            let interval = match log_line(text.as_bytes()) {
                Ok((_, LogLine::StartTime(secs))) => {
                    debug!(start_time_sec = secs, "log start time");
                    self.start_time_sec = Some(secs);
                    continue;
                }
                Ok((_, LogLine::BaseTime(secs))) => {
                    debug!(base_time_sec = secs, "log base time");
                    self.base_time_sec = Some(secs);
                    continue;
                }
                Ok((_, LogLine::Ignored)) => {
                    trace!(line = self.line_number, "skipping log line");
                    continue;
                }
                Ok((_, LogLine::Interval(interval))) => interval,
                Err(_) => {
                    debug!(line = self.line_number, "unparseable log line");
                    return Err(LogReadError::Parse {
                        line: self.line_number,
                    });
                }
            };

            let start_time_sec = *self
                .start_time_sec
                .get_or_insert(interval.start_timestamp);
            let base_time_sec = *self.base_time_sec.get_or_insert_with(|| {
                if interval.start_timestamp < start_time_sec - SECONDS_PER_YEAR {
                    start_time_sec
                } else {
                    0.0
                }
            });

            let absolute_start_sec = interval.start_timestamp + base_time_sec;
            let absolute_end_sec = absolute_start_sec + interval.interval_length;
            let start_to_check = if absolute {
                absolute_start_sec
            } else {
                absolute_start_sec - start_time_sec
            };

            if start_to_check < start_sec {
                trace!(line = self.line_number, "interval before range");
                continue;
            }
            if start_to_check > end_sec {
                return Ok(None);
            }

            let mut h: Histogram<T> = self.decode(interval.encoded_histogram).map_err(|e| {
                debug!(line = self.line_number, error = %e, "undecodable histogram");
                LogReadError::Decode {
                    line: self.line_number,
                    source: e,
                }
            })?;
            h.set_start_time_ms((absolute_start_sec * 1000.0).round() as i64);
            h.set_end_time_ms((absolute_end_sec * 1000.0).round() as i64);
            h.set_tag(interval.tag);

            if h.total_count() > 0 {
                let (min, max) = (h.min(), h.max());
                self.range_observed_min = Some(self.range_observed_min.map_or(min, |m| m.min(min)));
                self.range_observed_max = Some(self.range_observed_max.map_or(max, |m| m.max(max)));
            }

            trace!(
                line = self.line_number,
                start_ms = h.start_time_ms(),
                interval_max = interval.max,
                "read interval histogram"
            );
            return Ok(Some(h));
        }
    }

    fn decode<T: Counter>(&mut self, encoded: &str) -> Result<Histogram<T>, DeserializeError> {
        self.decode_buf.clear();
        base64::decode_config_buf(encoded, base64::STANDARD, &mut self.decode_buf)
            .map_err(DeserializeError::Base64)?;
        self.deserializer.deserialize(&mut self.decode_buf.as_slice())
    }

    /// StartTime of the log in seconds since the epoch, once known.
    pub fn start_time_sec(&self) -> Option<f64> {
        self.start_time_sec
    }

    /// BaseTime of the log in seconds since the epoch, once known.
    pub fn base_time_sec(&self) -> Option<f64> {
        self.base_time_sec
    }

    /// Smallest `min()` of the non-empty histograms returned so far.
    pub fn range_observed_min(&self) -> Option<i64> {
        self.range_observed_min
    }

    /// Largest `max()` of the non-empty histograms returned so far.
    pub fn range_observed_max(&self) -> Option<i64> {
        self.range_observed_max
    }
}

/// The fields of one interval line.
#[derive(Debug, PartialEq)]
struct IntervalLine<'a> {
    tag: Option<&'a str>,
    start_timestamp: f64,
    interval_length: f64,
    max: f64,
    encoded_histogram: &'a str,
}

#[derive(Debug, PartialEq)]
enum LogLine<'a> {
    StartTime(f64),
    BaseTime(f64),
    Ignored,
    Interval(IntervalLine<'a>),
}

type LineResult<'a, O> = IResult<&'a [u8], O, (&'a [u8], ErrorKind)>;

fn start_time(input: &[u8]) -> LineResult<f64> {
    let (input, _) = tag("#[StartTime: ")(input)?;
    double(input)
}

fn base_time(input: &[u8]) -> LineResult<f64> {
    let (input, _) = alt((tag("#[BaseTime: "), tag("#[Basetime: ")))(input)?;
    double(input)
}

fn tag_parser(input: &[u8]) -> LineResult<&str> {
    let (input, _) = tag("Tag=")(input)?;
    let (input, tag) = map_res(take_until(","), str::from_utf8)(input)?;
    let (input, _) = take(1_usize)(input)?;
    Ok((input, tag))
}

fn is_base64(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'+' || c == b'/' || c == b'='
}

fn interval_hist(input: &[u8]) -> LineResult<IntervalLine> {
    let (input, tag) = opt(tag_parser)(input)?;
    let (input, start_timestamp) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, interval_length) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, max) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, encoded_histogram) = map_res(take_while1(is_base64), str::from_utf8)(input)?;

    Ok((
        input,
        IntervalLine {
            tag,
            start_timestamp,
            interval_length,
            max,
            encoded_histogram,
        },
    ))
}

fn comment_line(input: &[u8]) -> LineResult<()> {
    map(tag("#"), |_| ())(input)
}

fn legend(input: &[u8]) -> LineResult<()> {
    map(tag("\"StartTimestamp\""), |_| ())(input)
}

/// Classify one line, without its line terminator.
fn log_line(input: &[u8]) -> LineResult<LogLine> {
    // headers first, otherwise they would be taken for plain comments
    alt((
        map(start_time, LogLine::StartTime),
        map(base_time, LogLine::BaseTime),
        map(alt((comment_line, legend)), |_| LogLine::Ignored),
        map(all_consuming(interval_hist), LogLine::Interval),
    ))(input)
}
