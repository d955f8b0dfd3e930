//! ECS metadata merge and parse driver.
//!
//! HDF-EOS2 writers split long ECS metadata blocks (`CoreMetadata`,
//! `ArchiveMetadata`, `StructMetadata`, ...) across several global attributes
//! with numeric suffixes. The fragments of one basename are classified by
//! suffix, concatenated in the order the library enumerates them and handed to
//! a [`MetadataParser`]. Every global attribute not consumed here ends up in
//! `HDF_GLOBAL`.

use std::collections::{HashSet, VecDeque};

use h4_common::{AttrTable, CfType, Das, H4Error, H4Result, RawAttribute};
use tracing::{debug, warn};

use crate::codec::append_raw_attr;
use crate::naming::to_cf_name;

/// ECS basenames written when ECS metadata is requested, in this order.
pub const ECS_METADATA_BASENAMES: [&str; 6] = [
    "CoreMetadata",
    "coremetadata",
    "ArchiveMetadata",
    "archivemetadata",
    "ProductMetadata",
    "productmetadata",
];

pub const STRUCT_METADATA: &str = "StructMetadata";

pub const HDF_GLOBAL: &str = "HDF_GLOBAL";

/// Globals with these prefixes are never copied to `HDF_GLOBAL`.
const METADATA_PREFIXES: [&str; 7] = [
    "StructMetadata",
    "CoreMetadata",
    "coremetadata",
    "ArchiveMetadata",
    "archivemetadata",
    "Productmetadata",
    "productmetadata",
];

/// How the fragments of one basename are suffixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixKind {
    /// `CoreMetadata`
    NoSuffix,
    /// `CoreMetadata.0` only
    SingleZero,
    /// `CoreMetadata.0`, `.1`, `.2`, ...
    OneDot,
    /// `CoreMetadata.0.1`, `.0.2`, ...
    TwoDots,
}

/// Fragment names of one basename, split by suffix form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EcsClassification {
    pub one_dot: VecDeque<String>,
    pub two_dots: VecDeque<String>,
    /// `.s`, `.t`, ... variants, each parsed on its own.
    pub non_number: Vec<String>,
    pub kind: Option<SuffixKind>,
}

impl EcsClassification {
    /// Fragments to concatenate, in enumeration order.
    pub fn merge_order(&self) -> Vec<&str> {
        let list = match self.kind {
            Some(SuffixKind::TwoDots) => &self.two_dots,
            Some(_) => &self.one_dot,
            None => return Vec::new(),
        };
        list.iter().map(String::as_str).collect()
    }
}

/// Classify every name starting with `basename`.
///
/// Mixing `.N` (N != 0) and `.N.M` suffixes under one basename is ambiguous
/// and rejected.
pub fn classify<'n>(names: impl IntoIterator<Item = &'n str>, basename: &str) -> H4Result<EcsClassification> {
    let mut c = EcsClassification::default();
    for name in names.into_iter().filter(|n| n.starts_with(basename)) {
        arrange(&mut c, name, basename)?;
    }
    Ok(c)
}

fn arrange(c: &mut EcsClassification, name: &str, basename: &str) -> H4Result<()> {
    let dots = name.matches('.').count();
    match dots {
        0 => {
            c.one_dot.push_front(name.to_string());
            c.two_dots.push_front(name.to_string());
            c.kind = Some(SuffixKind::NoSuffix);
        }
        1 => {
            let after = name.split_once('.').map(|(_, s)| s).unwrap_or("");
            if after.is_empty() {
                return Err(H4Error::EcsBuffer(format!("'{name}' has nothing after its dot")));
            }
            match leading_int(after) {
                None => c.non_number.push(name.to_string()),
                Some(0) => {
                    c.one_dot.push_back(name.to_string());
                    c.two_dots.push_back(name.to_string());
                    c.kind = Some(SuffixKind::SingleZero);
                }
                Some(_) => {
                    c.one_dot.push_back(name.to_string());
                    if c.kind == Some(SuffixKind::TwoDots) {
                        return Err(H4Error::EcsSuffixConflict {
                            basename: basename.to_string(),
                        });
                    }
                    c.kind = Some(SuffixKind::OneDot);
                }
            }
        }
        _ => {
            c.two_dots.push_back(name.to_string());
            if c.kind == Some(SuffixKind::OneDot) {
                return Err(H4Error::EcsSuffixConflict {
                    basename: basename.to_string(),
                });
            }
            c.kind = Some(SuffixKind::TwoDots);
        }
    }
    Ok(())
}

/// Stream-style integer extraction: optional whitespace and sign, then at
/// least one digit. Trailing text is ignored.
fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let digits = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits {
        return None;
    }
    s[..end].parse().ok()
}

/// Concatenate fragment texts. The order is kept as given.
pub fn merge<S: AsRef<str>>(fragments: impl IntoIterator<Item = S>) -> String {
    fragments.into_iter().fold(String::new(), |mut acc, s| {
        acc.push_str(s.as_ref());
        acc
    })
}

/// Text of a metadata fragment. The buffer must be NUL-terminated one byte
/// past its declared count, or exactly `count` bytes long.
pub fn fragment_text(attr: &RawAttribute) -> H4Result<String> {
    if attr.data.len() > attr.count && attr.data[attr.count] != 0 {
        return Err(H4Error::EcsBuffer(format!(
            "'{}' is not NUL-terminated",
            attr.name
        )));
    }
    let end = attr.count.min(attr.data.len());
    Ok(h4_common::dtype::bytes_to_text(&attr.data[..end]))
}

/// Outcome of a parse that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    Ok,
    /// Some statements were not understood. Metadata is best-effort, so this
    /// is only logged.
    NotOk(String),
}

/// The ECS grammar collaborator.
pub trait MetadataParser {
    /// Fill `table` from one metadata block. `Err` is fatal for the file.
    fn parse(&self, table: &mut AttrTable, metadata: &str) -> H4Result<ParseStatus>;
}

/// Line-oriented ODL reader.
///
/// `GROUP`/`OBJECT` statements open a scope and `END_GROUP`/`END_OBJECT`
/// close it; every `NAME = VALUE` becomes an attribute named by its dotted
/// scope path, e.g. `INVENTORYMETADATA.LOCALGRANULEID.VALUE`. Parenthesised
/// lists become multi-valued attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueParser;

impl MetadataParser for KeyValueParser {
    fn parse(&self, table: &mut AttrTable, metadata: &str) -> H4Result<ParseStatus> {
        let mut scopes: Vec<String> = Vec::new();
        let mut problems: Vec<String> = Vec::new();

        for statement in statements(metadata).map_err(|detail| H4Error::MetadataParse {
            name: table.name().to_string(),
            detail,
        })? {
            let statement = statement.trim();
            if statement.is_empty() || statement.starts_with("/*") {
                continue;
            }
            if statement == "END" {
                break;
            }
            let Some((key, value)) = statement.split_once('=') else {
                problems.push(format!("no '=' in '{statement}'"));
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "GROUP" | "OBJECT" => scopes.push(unquote(value).to_string()),
                "END_GROUP" | "END_OBJECT" => match scopes.pop() {
                    Some(open) if open == unquote(value) => {}
                    Some(open) => problems.push(format!("{key} = {value} closes '{open}'")),
                    None => problems.push(format!("{key} = {value} without an open scope")),
                },
                _ => {
                    let name = if scopes.is_empty() {
                        key.to_string()
                    } else {
                        format!("{}.{key}", scopes.join("."))
                    };
                    let (cf_type, values) = parse_value(value);
                    if let Err(e) = table.append_values(&name, cf_type, &values) {
                        problems.push(e.to_string());
                    }
                }
            }
        }

        if !scopes.is_empty() {
            problems.push(format!("unclosed scopes {scopes:?}"));
        }
        if problems.is_empty() {
            Ok(ParseStatus::Ok)
        } else {
            Ok(ParseStatus::NotOk(problems.join("; ")))
        }
    }
}

/// Join physical lines into statements; a quoted string or a parenthesised
/// list may span lines.
fn statements(text: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut depth = 0i32;
    for line in text.lines() {
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
        for ch in line.chars() {
            match ch {
                '"' => in_quote = !in_quote,
                '(' if !in_quote => depth += 1,
                ')' if !in_quote => depth -= 1,
                _ => {}
            }
        }
        if !in_quote && depth <= 0 {
            out.push(std::mem::take(&mut current));
            depth = 0;
        }
    }
    if in_quote {
        return Err("unterminated quoted string".to_string());
    }
    if depth > 0 {
        return Err("unbalanced parentheses".to_string());
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    Ok(out)
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(s)
}

fn parse_value(value: &str) -> (CfType, Vec<String>) {
    let inner = value
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(value);
    let items = split_items(inner);

    let all_int = items.iter().all(|i| !is_quoted(i) && i.parse::<i32>().is_ok());
    let all_num = items.iter().all(|i| !is_quoted(i) && i.parse::<f64>().is_ok());
    let cf_type = if items.is_empty() {
        CfType::String
    } else if all_int {
        CfType::Int32
    } else if all_num {
        CfType::Float64
    } else {
        CfType::String
    };
    let values = items.iter().map(|i| unquote(i).to_string()).collect();
    (cf_type, values)
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

fn split_items(s: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in s.chars() {
        match ch {
            '"' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            ',' if !in_quote => items.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

/// Writes the ECS tables of one file and then the remaining globals.
pub struct EcsMetadataWriter<'a> {
    attributes: &'a [RawAttribute],
    parser: &'a dyn MetadataParser,
    consumed: HashSet<String>,
}

impl<'a> EcsMetadataWriter<'a> {
    pub fn new(attributes: &'a [RawAttribute], parser: &'a dyn MetadataParser) -> Self {
        Self {
            attributes,
            parser,
            consumed: HashSet::new(),
        }
    }

    fn find(&self, name: &str) -> H4Result<&RawAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| H4Error::library("SDfindattr", format!("no global attribute '{name}'")))
    }

    /// Merge and parse every fragment of `basename`.
    pub fn write(&mut self, das: &mut Das, basename: &str) -> H4Result<()> {
        let classification = classify(self.attributes.iter().map(|a| a.name.as_str()), basename)?;

        let mut texts = Vec::new();
        for name in classification.merge_order() {
            self.consumed.insert(name.to_string());
            texts.push(fragment_text(self.find(name)?)?);
        }
        let merged = merge(&texts);

        let mut separate = Vec::new();
        for name in &classification.non_number {
            self.consumed.insert(name.clone());
            separate.push((name.clone(), fragment_text(self.find(name)?)?));
        }

        if merged.is_empty() && separate.is_empty() {
            return Ok(());
        }
        if separate.is_empty() {
            self.parse_into(das, basename, &merged)
        } else {
            for (name, text) in &separate {
                self.parse_into(das, name, text)?;
            }
            Ok(())
        }
    }

    fn parse_into(&self, das: &mut Das, table_name: &str, text: &str) -> H4Result<()> {
        debug!(table = %table_name, bytes = text.len(), "Parsing ECS metadata");
        let table = das.get_or_create(table_name);
        match self.parser.parse(table, text)? {
            ParseStatus::Ok => {}
            ParseStatus::NotOk(reason) => {
                warn!(table = %table_name, reason = %reason, "ECS metadata parsed with errors");
            }
        }
        Ok(())
    }

    /// Copy every global attribute that is not ECS metadata to `HDF_GLOBAL`.
    pub fn write_non_ecs(&self, das: &mut Das) -> H4Result<()> {
        for attr in self.attributes {
            if self.consumed.contains(&attr.name)
                || METADATA_PREFIXES.iter().any(|p| attr.name.starts_with(p))
            {
                continue;
            }
            append_raw_attr(das.get_or_create(HDF_GLOBAL), &to_cf_name(&attr.name), attr)?;
        }
        Ok(())
    }

    pub fn consumed(&self) -> &HashSet<String> {
        &self.consumed
    }
}

/// Write the ECS tables, then StructMetadata, then the other globals.
pub fn write_ecs_metadata(
    das: &mut Das,
    attributes: &[RawAttribute],
    parser: &dyn MetadataParser,
    include_ecs: bool,
    include_struct_metadata: bool,
) -> H4Result<()> {
    let mut writer = EcsMetadataWriter::new(attributes, parser);
    if include_ecs {
        for basename in ECS_METADATA_BASENAMES {
            writer.write(das, basename)?;
        }
    }
    if include_struct_metadata {
        writer.write(das, STRUCT_METADATA)?;
    }
    writer.write_non_ecs(das)
}

#[cfg(test)]
mod tests {
    use super::*;
    use h4_common::NumberType;

    fn names(c: &EcsClassification) -> Vec<&str> {
        c.merge_order()
    }

    #[test]
    fn test_merge_keeps_order() {
        assert_eq!(merge(["A", "B"]), "AB");
        let c = classify(["CoreMetadata.0", "CoreMetadata.1"], "CoreMetadata").unwrap();
        assert_eq!(c.kind, Some(SuffixKind::OneDot));
        assert_eq!(names(&c), vec!["CoreMetadata.0", "CoreMetadata.1"]);
    }

    #[test]
    fn test_no_suffix_and_single_zero() {
        let c = classify(["StructMetadata", "HDFEOSVersion"], "StructMetadata").unwrap();
        assert_eq!(c.kind, Some(SuffixKind::NoSuffix));
        assert_eq!(names(&c), vec!["StructMetadata"]);

        let c = classify(["StructMetadata.0"], "StructMetadata").unwrap();
        assert_eq!(c.kind, Some(SuffixKind::SingleZero));
    }

    #[test]
    fn test_two_dots() {
        let c = classify(["CoreMetadata.0", "CoreMetadata.0.1"], "CoreMetadata").unwrap();
        assert_eq!(c.kind, Some(SuffixKind::TwoDots));
        assert_eq!(names(&c), vec!["CoreMetadata.0", "CoreMetadata.0.1"]);
    }

    #[test]
    fn test_suffix_conflict() {
        let err = classify(["CoreMetadata.1", "CoreMetadata.0.1"], "CoreMetadata").unwrap_err();
        assert!(matches!(err, H4Error::EcsSuffixConflict { .. }));
        let err = classify(["CoreMetadata.0.1", "CoreMetadata.2"], "CoreMetadata").unwrap_err();
        assert!(matches!(err, H4Error::EcsSuffixConflict { .. }));
    }

    #[test]
    fn test_non_number_and_bare_dot() {
        let c = classify(["ArchiveMetadata.s", "ArchiveMetadata.t"], "ArchiveMetadata").unwrap();
        assert_eq!(c.non_number.len(), 2);
        assert_eq!(c.kind, None);
        assert_eq!(names(&c).len(), 0);
        assert!(matches!(
            classify(["CoreMetadata."], "CoreMetadata"),
            Err(H4Error::EcsBuffer(_))
        ));
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("12"), Some(12));
        assert_eq!(leading_int(" 3x"), Some(3));
        assert_eq!(leading_int("-1"), Some(-1));
        assert_eq!(leading_int("s"), None);
    }

    #[test]
    fn test_fragment_text_requires_nul() {
        let ok = RawAttribute::new("CoreMetadata.0", NumberType::Char8, b"abc\0".to_vec());
        let mut ok = ok;
        ok.count = 3;
        assert_eq!(fragment_text(&ok).unwrap(), "abc");

        let mut bad = RawAttribute::new("CoreMetadata.0", NumberType::Char8, b"abcd".to_vec());
        bad.count = 3;
        assert!(matches!(fragment_text(&bad), Err(H4Error::EcsBuffer(_))));

        let exact = RawAttribute::from_text("CoreMetadata.0", "xyz");
        assert_eq!(fragment_text(&exact).unwrap(), "xyz");
    }

    const CORE: &str = "GROUP = INVENTORYMETADATA\n  OBJECT = LOCALGRANULEID\n    NUM_VAL = 1\n    VALUE = \"MOD09GA.A2010001.hdf\"\n  END_OBJECT = LOCALGRANULEID\n  OBJECT = BOUNDS\n    VALUE = (1.5, 2,\n      3)\n  END_OBJECT = BOUNDS\nEND_GROUP = INVENTORYMETADATA\nEND\n";

    #[test]
    fn test_key_value_parser() {
        let mut table = AttrTable::new("CoreMetadata");
        let status = KeyValueParser.parse(&mut table, CORE).unwrap();
        assert_eq!(status, ParseStatus::Ok);
        assert_eq!(
            table.first_value("INVENTORYMETADATA.LOCALGRANULEID.VALUE"),
            Some("MOD09GA.A2010001.hdf")
        );
        assert_eq!(
            table.attr_type("INVENTORYMETADATA.LOCALGRANULEID.NUM_VAL"),
            Some(CfType::Int32)
        );
        let bounds = table.simple_find("INVENTORYMETADATA.BOUNDS.VALUE").unwrap();
        assert_eq!(bounds.cf_type, CfType::Float64);
        assert_eq!(bounds.values, vec!["1.5", "2", "3"]);
    }

    #[test]
    fn test_parser_status_and_errors() {
        let mut table = AttrTable::new("CoreMetadata");
        let status = KeyValueParser
            .parse(&mut table, "GROUP = A\nGARBAGE\nEND_GROUP = B\n")
            .unwrap();
        assert!(matches!(status, ParseStatus::NotOk(_)));

        let err = KeyValueParser.parse(&mut table, "VALUE = \"open\n").unwrap_err();
        assert!(matches!(err, H4Error::MetadataParse { .. }));
    }

    #[test]
    fn test_write_ecs_metadata() {
        let attrs = vec![
            RawAttribute::from_text("CoreMetadata.0", &CORE[..40]),
            RawAttribute::from_text("CoreMetadata.1", &CORE[40..]),
            RawAttribute::from_text("StructMetadata.0", "GROUP = SwathStructure\nEND_GROUP = SwathStructure\nEND\n"),
            RawAttribute::from_text("HDFEOSVersion", "HDFEOS_V2.9"),
            RawAttribute::from_values("Num Scans", NumberType::Int32, &[203i32, 204]),
        ];
        let mut das = Das::new();
        write_ecs_metadata(&mut das, &attrs, &KeyValueParser, true, false).unwrap();

        let core = das.get_table("CoreMetadata").unwrap();
        assert_eq!(
            core.first_value("INVENTORYMETADATA.LOCALGRANULEID.VALUE"),
            Some("MOD09GA.A2010001.hdf")
        );
        assert!(das.get_table("StructMetadata").is_none());

        let global = das.get_table(HDF_GLOBAL).unwrap();
        assert_eq!(global.first_value("HDFEOSVersion"), Some("HDFEOS_V2.9"));
        let scans = global.simple_find("Num_Scans").unwrap();
        assert_eq!(scans.values, vec!["203", "204"]);
        assert!(!global.contains("StructMetadata_0"));
    }

    #[test]
    fn test_non_number_parsed_separately() {
        let attrs = vec![
            RawAttribute::from_text("ArchiveMetadata.s", "A = 1\n"),
            RawAttribute::from_text("ArchiveMetadata.t", "B = 2\n"),
        ];
        let mut das = Das::new();
        write_ecs_metadata(&mut das, &attrs, &KeyValueParser, true, true).unwrap();
        assert_eq!(das.get_table("ArchiveMetadata.s").unwrap().first_value("A"), Some("1"));
        assert_eq!(das.get_table("ArchiveMetadata.t").unwrap().first_value("B"), Some("2"));
        assert!(das.get_table("ArchiveMetadata").is_none());
    }
}
