//! Tag-list parsing for DKIM key records and DMARC policy records.
//!
//! Both formats are `tag=value` pairs separated by `;`. The parser is total:
//! any input string yields a (possibly empty) list, malformed segments are skipped.

/// One `tag=value` pair. Names are lowercased, values trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: String,
    pub value: &'a str,
}

pub fn parse_tags(record: &str) -> Vec<Tag<'_>> {
    record
        .split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Tag {
                name: name.to_ascii_lowercase(),
                value: value.trim(),
            })
        })
        .collect()
}

/// Value of the first tag called `name`, if present.
pub fn find_tag<'a>(tags: &[Tag<'a>], name: &str) -> Option<&'a str> {
    tags.iter().find(|t| t.name == name).map(|t| t.value)
}
