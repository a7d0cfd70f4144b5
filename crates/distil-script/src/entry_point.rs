//! Parsing `entry_points.txt` and individual entry-point values.
//!
//! Grounded on `install-wheel-rs::script::Script::from_value` (the regex for
//! `module:attrs [extras]`) and its `scripts_from_ini` reader, adapted from wheel's
//! `entry_points.txt` (read via `configparser`, same as the teacher) to the classic
//! `EGG-INFO/entry_points.txt` an egg carries.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use configparser::ini::Ini;
use regex::Regex;

use crate::ScriptError;

/// One `name = module:attrs [extras]` line, resolved to its module and dotted
/// attribute chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryPoint {
    pub name: String,
    pub module: String,
    pub attrs: String,
}

impl EntryPoint {
    /// Parse a single entry-point value, e.g. `foomod:main` or `foomod:main [extra]`.
    ///
    /// Extras on the value gate whether this entry point applies under the active
    /// extras set; pass `None` to ignore gating entirely.
    pub fn from_value(
        name: &str,
        value: &str,
        extras: Option<&BTreeSet<String>>,
    ) -> Result<Option<Self>, ScriptError> {
        static ENTRY_POINT_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENTRY_POINT_REGEX.get_or_init(|| {
            Regex::new(
                r"^(?P<module>[\w\d_.]+)\s*:\s*(?P<attrs>[\w\d_.]+)(?:\s*\[\s*(?P<extras>(?:[^,]+,?\s*)+)\])?\s*$",
            )
            .unwrap()
        });

        let captures = re
            .captures(value.trim())
            .ok_or_else(|| ScriptError::InvalidEntryPoint(value.to_string()))?;

        if let (Some(extras), Some(required)) = (extras, captures.name("extras")) {
            let required: BTreeSet<String> = required
                .as_str()
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if !required.is_subset(extras) {
                return Ok(None);
            }
        }

        Ok(Some(Self {
            name: name.to_string(),
            module: captures.name("module").unwrap().as_str().to_string(),
            attrs: captures.name("attrs").unwrap().as_str().to_string(),
        }))
    }
}

/// Read the `console_scripts` and `gui_scripts` sections of an `entry_points.txt`
/// file's contents, gated by `extras`.
pub fn entry_points_from_ini(
    contents: &str,
    extras: &BTreeSet<String>,
) -> Result<(Vec<EntryPoint>, Vec<EntryPoint>), ScriptError> {
    let mapping = Ini::new_cs()
        .read(contents.to_string())
        .map_err(|err| ScriptError::InvalidEntryPointsFile(err))?;

    let console = read_section(&mapping, "console_scripts", extras)?;
    let gui = read_section(&mapping, "gui_scripts", extras)?;
    Ok((console, gui))
}

fn read_section(
    mapping: &std::collections::HashMap<String, std::collections::HashMap<String, Option<String>>>,
    section: &str,
    extras: &BTreeSet<String>,
) -> Result<Vec<EntryPoint>, ScriptError> {
    let Some(entries) = mapping.get(section) else {
        return Ok(Vec::new());
    };
    let mut points = Vec::new();
    for (name, value) in entries {
        let Some(value) = value else { continue };
        if let Some(entry_point) = EntryPoint::from_value(name, value, Some(extras))? {
            points.push(entry_point);
        }
    }
    points.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(points)
}
