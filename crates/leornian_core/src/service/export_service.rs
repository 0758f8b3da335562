//! Account data export.
//!
//! # Responsibility
//! - Package a user's collected notes as a deflated zip archive holding a
//!   CSV file, a JSON file and a README.
//!
//! # Invariants
//! - One row per collected note, ordered by note creation.
//! - The CSV is UTF-8 with a BOM; an empty collection yields a BOM and no
//!   header row.
//! - The JSON is an array indented with four spaces, ASCII only: other
//!   characters are written as `\uXXXX` escapes.
//! - Timestamps are ISO 8601 in UTC with a `+00:00` offset.

use crate::config::Settings;
use crate::model::collection::CollectedNote;
use crate::model::user::User;
use crate::repo::collection_repo::{CollectionRepository, SqliteCollectionRepository};
use crate::service::{ServiceError, ServiceResult};
use crate::time::{epoch_ms_to_date, epoch_ms_to_isoformat, now_epoch_ms, EpochMs};
use chrono::NaiveDate;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io::{self, Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CSV_FILE_NAME: &str = "collected_notes.csv";
pub const JSON_FILE_NAME: &str = "collected_notes.json";
pub const README_FILE_NAME: &str = "README.txt";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const FILENAME_USERNAME_MAX_CHARS: usize = 20;

const CSV_HEADERS: [&str; 9] = [
    "Note Code",
    "Text",
    "HTML",
    "Visibility",
    "Created",
    "Author",
    "Permalink",
    "Last Drilled",
    "Promoted?",
];

static SLUG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid slug strip regex"));
static SLUG_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("valid slug dash regex"));

/// One exported note; field names are the CSV headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedNote {
    #[serde(rename = "Note Code")]
    pub code: String,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "HTML")]
    pub html: String,
    #[serde(rename = "Visibility")]
    pub visibility: String,
    #[serde(rename = "Created")]
    pub created: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Permalink")]
    pub permalink: String,
    #[serde(rename = "Last Drilled")]
    pub last_drilled: String,
    #[serde(rename = "Promoted?")]
    pub promoted: bool,
}

impl ExportedNote {
    fn from_collected(item: &CollectedNote, settings: &Settings) -> Self {
        let note = &item.note;
        Self {
            code: note.code.clone(),
            text: note.text.clone(),
            html: note.html(),
            visibility: note.visibility.label().to_string(),
            created: epoch_ms_to_isoformat(note.created_at),
            author: note.author_username.clone().unwrap_or_default(),
            permalink: settings.absolute_url(&note.path()),
            last_drilled: epoch_ms_to_isoformat(item.entry.last_reviewed),
            promoted: item.entry.promoted,
        }
    }

    fn csv_record(&self) -> [&str; 9] {
        [
            self.code.as_str(),
            self.text.as_str(),
            self.html.as_str(),
            self.visibility.as_str(),
            self.created.as_str(),
            self.author.as_str(),
            self.permalink.as_str(),
            self.last_drilled.as_str(),
            if self.promoted { "True" } else { "False" },
        ]
    }
}

/// A finished export, ready to be written or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataArchive {
    pub filename: String,
    pub note_count: usize,
    pub bytes: Vec<u8>,
}

/// Download name: `leornian-data-{slug}-{YYYY-MM-DD}.zip`, with the slug
/// taken from the first 20 characters of the username.
pub fn export_filename(username: &str, date: NaiveDate) -> String {
    let short: String = username.chars().take(FILENAME_USERNAME_MAX_CHARS).collect();
    format!(
        "leornian-data-{}-{}.zip",
        slugify(&short),
        date.format("%Y-%m-%d")
    )
}

/// Lowercase, drops characters other than word characters, whitespace and
/// dashes, collapses dash/whitespace runs into one dash and trims `-`/`_`.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.chars().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let stripped = SLUG_STRIP_RE.replace_all(&lowered, "");
    let dashed = SLUG_DASH_RE.replace_all(&stripped, "-");
    dashed.trim_matches(['-', '_']).to_string()
}

pub struct ExportService<'a> {
    conn: &'a Connection,
    settings: &'a Settings,
}

impl<'a> ExportService<'a> {
    pub fn new(conn: &'a Connection, settings: &'a Settings) -> Self {
        Self { conn, settings }
    }

    pub fn export_user_data(&self, user: &User) -> ServiceResult<UserDataArchive> {
        self.export_user_data_at(user, now_epoch_ms())
    }

    /// Builds the archive as of `now`, which names the file and dates the README.
    pub fn export_user_data_at(&self, user: &User, now: EpochMs) -> ServiceResult<UserDataArchive> {
        let collected = SqliteCollectionRepository::try_new(self.conn)?.list_collected(user.id)?;
        let notes: Vec<ExportedNote> = collected
            .iter()
            .map(|item| ExportedNote::from_collected(item, self.settings))
            .collect();

        let csv_bytes = render_csv(&notes)?;
        let json_bytes = render_json(&notes)?;
        let readme = render_readme(user, notes.len(), now);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, contents) in [
            (CSV_FILE_NAME, csv_bytes.as_slice()),
            (JSON_FILE_NAME, json_bytes.as_slice()),
            (README_FILE_NAME, readme.as_bytes()),
        ] {
            zip.start_file(name, options).map_err(export_error)?;
            zip.write_all(contents).map_err(export_error)?;
        }
        let bytes = zip.finish().map_err(export_error)?.into_inner();

        info!(
            "event=user_export module=service status=ok user_id={} note_count={} archive_bytes={}",
            user.id,
            notes.len(),
            bytes.len()
        );
        Ok(UserDataArchive {
            filename: export_filename(&user.username, epoch_ms_to_date(now)),
            note_count: notes.len(),
            bytes,
        })
    }
}

fn render_csv(notes: &[ExportedNote]) -> ServiceResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(UTF8_BOM.to_vec());
    if !notes.is_empty() {
        writer.write_record(CSV_HEADERS).map_err(export_error)?;
        for note in notes {
            writer.write_record(note.csv_record()).map_err(export_error)?;
        }
    }
    writer
        .into_inner()
        .map_err(|err| ServiceError::Export(err.error().to_string()))
}

fn render_json(notes: &[ExportedNote]) -> ServiceResult<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = AsciiFormatter(PrettyFormatter::with_indent(b"    "));
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    notes.serialize(&mut serializer).map_err(export_error)?;
    Ok(out)
}

/// Pretty printing that escapes DEL and every non-ASCII character, UTF-16
/// surrogate pairs included.
struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (at, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\u{7f}' {
                continue;
            }
            writer.write_all(fragment[start..at].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = at + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_value(writer)
    }
}

fn render_readme(user: &User, note_count: usize, now: EpochMs) -> String {
    format!(
        "This is the archive of data for Leornian user account `{}`.\n\n\
         User account email: {}\n\
         Account created at: {}\n\n\
         Number of notes in collection: {note_count}\n\n\
         The CSV file in this archive is encoded in UTF-8 with BOM for \
         compatibility with Microsoft applications (especially Excel).\n\n\
         This archive was generated at {} (UTC).\n",
        user.username,
        user.email,
        epoch_ms_to_isoformat(user.date_joined),
        epoch_ms_to_isoformat(now)
    )
}

fn export_error(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Export(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{export_filename, render_csv, render_json, slugify, ExportedNote};
    use chrono::NaiveDate;

    fn sample(promoted: bool) -> ExportedNote {
        ExportedNote {
            code: "CDFGHJKMN".to_string(),
            text: "a, \"quoted\" note".to_string(),
            html: "<p>a, &quot;quoted&quot; note</p>\n".to_string(),
            visibility: "Normal".to_string(),
            created: "2024-01-02T03:04:05+00:00".to_string(),
            author: "mary".to_string(),
            permalink: "http://localhost:8000/CDFGHJKMN/".to_string(),
            last_drilled: "2024-01-03T03:04:05.250000+00:00".to_string(),
            promoted,
        }
    }

    #[test]
    fn slugify_keeps_filename_safe_characters() {
        assert_eq!(slugify("Mary.Jane+1"), "maryjane1");
        assert_eq!(slugify("--a  b--"), "a-b");
        assert_eq!(slugify("_x_"), "x");
    }

    #[test]
    fn export_filename_truncates_username_before_slugging() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).expect("valid date");
        assert_eq!(
            export_filename("abcdefghijklmnopqrstuvwxyz", date),
            "leornian-data-abcdefghijklmnopqrst-2024-05-06.zip"
        );
    }

    #[test]
    fn csv_starts_with_bom_and_header_row() {
        let bytes = render_csv(&[sample(true)]).expect("csv");
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(bytes[3..].to_vec()).expect("utf-8");
        let mut lines = text.split("\r\n");
        assert_eq!(
            lines.next(),
            Some("Note Code,Text,HTML,Visibility,Created,Author,Permalink,Last Drilled,Promoted?")
        );
        let row = lines.next().expect("data row");
        assert!(row.starts_with("CDFGHJKMN,\"a, \"\"quoted\"\" note\","));
        assert!(row.ends_with(",True"));
    }

    #[test]
    fn empty_export_has_bom_only_csv_and_empty_json_array() {
        assert_eq!(render_csv(&[]).expect("csv"), b"\xEF\xBB\xBF".to_vec());
        assert_eq!(render_json(&[]).expect("json"), b"[]".to_vec());
    }

    #[test]
    fn json_uses_header_names_and_four_space_indent() {
        let json = String::from_utf8(render_json(&[sample(false)]).expect("json")).expect("utf-8");
        assert!(json.starts_with("[\n    {\n        \"Note Code\": \"CDFGHJKMN\","));
        assert!(json.contains("\"Promoted?\": false"));
    }

    #[test]
    fn json_escapes_non_ascii_text() {
        let mut note = sample(false);
        note.text = "caf\u{e9} \u{1f600} \u{7f}".to_string();
        let json = String::from_utf8(render_json(&[note]).expect("json")).expect("utf-8");
        assert!(json.is_ascii());
        assert!(json.contains(r#""Text": "caf\u00e9 \ud83d\ude00 \u007f","#));
        assert!(json.contains(r#""Last Drilled": "2024-01-03T03:04:05.250000+00:00","#));
    }
}
