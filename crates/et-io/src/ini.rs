use std::fs;
use std::path::Path;

use crate::IoError;

/// One `[NAME]` block. Keys keep their case and their file order; a key
/// given twice appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Last value given for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    #[must_use]
    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(IniSection {
                    name: name.to_owned(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }
}

pub fn read_ini(path: &Path) -> Result<IniDocument, IoError> {
    let text = fs::read_to_string(path)?;
    parse_ini(&text)
}

/// Parse `[SECTION]` headers and `key = value` / `key: value` lines. Lines
/// starting with `#` or `;` are comments. A section named twice is merged.
pub fn parse_ini(text: &str) -> Result<IniDocument, IoError> {
    let mut doc = IniDocument::default();
    let mut current: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| IoError::Ini {
                line: line_no,
                message: format!("unterminated section header '{line}'"),
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(IoError::Ini {
                    line: line_no,
                    message: "empty section name".to_owned(),
                });
            }
            doc.section_mut(name);
            current = Some(name.to_owned());
            continue;
        }

        let Some(section) = current.as_deref() else {
            return Err(IoError::Ini {
                line: line_no,
                message: format!("option '{line}' appears before any section header"),
            });
        };

        let split_at = line.find(['=', ':']).ok_or_else(|| IoError::Ini {
            line: line_no,
            message: format!("expected 'key = value', found '{line}'"),
        })?;
        let key = line[..split_at].trim();
        let value = line[split_at + 1..].trim();
        if key.is_empty() {
            return Err(IoError::Ini {
                line: line_no,
                message: "option with empty key".to_owned(),
            });
        }

        doc.section_mut(section)
            .entries
            .push((key.to_owned(), value.to_owned()));
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::parse_ini;
    use crate::IoError;

    const OPTIONS: &str = "\
# resampling options
[SETTINGS]
FILE_TYPES = txt,text
RESAMPLING_RATE = 5
GROUP_BY: TRIAL_INDEX

[AGGREGATE TYPE]
RIGHT_GAZE_X = mean,median
RIGHT_PUPIL_SIZE = mean
; trailing comment
[CONSOLE OUTPUT]
PERCENT_PREC = 2
";

    #[test]
    fn parses_sections_in_file_order() {
        let doc = parse_ini(OPTIONS).expect("parse");
        let names: Vec<&str> = doc.sections().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["SETTINGS", "AGGREGATE TYPE", "CONSOLE OUTPUT"]);
        assert_eq!(doc.get("SETTINGS", "GROUP_BY"), Some("TRIAL_INDEX"));
        assert_eq!(doc.get("CONSOLE OUTPUT", "PERCENT_PREC"), Some("2"));
        assert_eq!(doc.get("SETTINGS", "missing"), None);
    }

    #[test]
    fn keys_are_case_sensitive_and_ordered() {
        let doc = parse_ini(OPTIONS).expect("parse");
        let aggs = doc.section("AGGREGATE TYPE").expect("section");
        assert_eq!(
            aggs.entries(),
            &[
                ("RIGHT_GAZE_X".to_owned(), "mean,median".to_owned()),
                ("RIGHT_PUPIL_SIZE".to_owned(), "mean".to_owned()),
            ]
        );
        assert_eq!(aggs.get("right_gaze_x"), None);
    }

    #[test]
    fn repeated_sections_and_keys_merge_in_order() {
        let doc = parse_ini("[A]\nx = 1\n[B]\ny = 2\n[A]\nx = 3\n").expect("parse");
        assert_eq!(doc.sections().len(), 2);
        let a = doc.section("A").expect("A");
        assert_eq!(a.entries().len(), 2);
        assert_eq!(a.get("x"), Some("3"));
    }

    #[test]
    fn option_before_section_is_rejected() {
        let err = parse_ini("x = 1\n").expect_err("no section");
        assert!(matches!(err, IoError::Ini { line: 1, .. }));
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let err = parse_ini("[A]\nnot an option\n").expect_err("bad line");
        assert!(matches!(err, IoError::Ini { line: 2, .. }));
        let err = parse_ini("[A\n").expect_err("bad header");
        assert!(matches!(err, IoError::Ini { line: 1, .. }));
    }
}
