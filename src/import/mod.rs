mod analyze;
mod classify;
mod columns;
mod key;
mod normalize;
mod source;
mod stream;

pub(crate) use analyze::{analyze_file, analyze_import, AnalyzeOptions, ImportSource};
pub(crate) use key::{build_key, normalize_description, KeyInput};
pub(crate) use source::{parse_json_rows, read_source};
pub(crate) use stream::{should_stream, CsvStream, StreamOptions};
