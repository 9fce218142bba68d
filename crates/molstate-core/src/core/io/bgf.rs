use crate::core::objects::molecule::{Atom, Model};
use nalgebra::Point3;
use std::collections::HashSet;
use std::io::{self, BufRead};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BgfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: BgfParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("No ATOM/HETATM records found")]
    NoAtoms,
}

#[derive(Debug, Error, PartialEq)]
pub enum BgfParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: &'static str },
    #[error("Line is too short for ATOM/HETATM record (must be at least 80 chars)")]
    LineTooShort,
}

/// A parsed BGF document: the optional `DESCRP` title and one model per frame.
///
/// Frames are separated by `END`/`ENDMDL` records. Connectivity (`CONECT`/`ORDER`) and
/// format records are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct BgfDocument {
    pub description: Option<String>,
    pub frames: Vec<Model>,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    line_num: usize,
    (start, end): (usize, usize),
    columns: &'static str,
    float: bool,
) -> Result<T, BgfError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| BgfError::Parse {
        line: line_num,
        kind: if float {
            BgfParseErrorKind::InvalidFloat {
                columns,
                value: value.into(),
            }
        } else {
            BgfParseErrorKind::InvalidInt {
                columns,
                value: value.into(),
            }
        },
    })
}

fn parse_atom_line(line: &str, line_num: usize, hetero: bool) -> Result<Atom, BgfError> {
    if line.len() < 80 {
        return Err(BgfError::Parse {
            line: line_num,
            kind: BgfParseErrorKind::LineTooShort,
        });
    }

    let name = slice_and_trim(line, 13, 18);
    if name.is_empty() {
        return Err(BgfError::Parse {
            line: line_num,
            kind: BgfParseErrorKind::MissingRequiredField { columns: "14-18" },
        });
    }
    let ff_type = slice_and_trim(line, 61, 66);
    if ff_type.is_empty() {
        return Err(BgfError::Parse {
            line: line_num,
            kind: BgfParseErrorKind::MissingRequiredField { columns: "62-66" },
        });
    }

    let serial: usize = parse_field(line, line_num, (7, 12), "8-12", false)?;
    let res_seq: isize = parse_field(line, line_num, (25, 30), "26-30", false)?;
    let x: f64 = parse_field(line, line_num, (30, 40), "31-40", true)?;
    let y: f64 = parse_field(line, line_num, (40, 50), "41-50", true)?;
    let z: f64 = parse_field(line, line_num, (50, 60), "51-60", true)?;
    let charge: f64 = parse_field(line, line_num, (72, 80), "73-80", true)?;

    Ok(Atom {
        serial,
        name: name.to_string(),
        res_name: slice_and_trim(line, 19, 22).to_string(),
        res_seq,
        chain_id: slice_and_trim(line, 23, 24).chars().next().unwrap_or('A'),
        position: Point3::new(x, y, z),
        charge,
        ff_type: ff_type.to_string(),
        hetero,
    })
}

/// Reads every frame of a BGF stream.
pub fn read_from(reader: impl BufRead) -> Result<BgfDocument, BgfError> {
    let mut description = None;
    let mut frames = Vec::new();
    let mut atoms: Vec<Atom> = Vec::new();
    let mut seen_serials = HashSet::new();

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;

        match slice_and_trim(&line, 0, 6) {
            record @ ("ATOM" | "HETATM") => {
                let atom = parse_atom_line(&line, line_num, record == "HETATM")?;
                if !seen_serials.insert(atom.serial) {
                    return Err(BgfError::Inconsistency(format!(
                        "Duplicate atom serial {} on line {}",
                        atom.serial, line_num
                    )));
                }
                atoms.push(atom);
            }
            "END" | "ENDMDL" => {
                if !atoms.is_empty() {
                    frames.push(Model::from_atoms(std::mem::take(&mut atoms)));
                    seen_serials.clear();
                }
            }
            "DESCRP" if description.is_none() => {
                let text = line.get(6..).unwrap_or("").trim();
                if !text.is_empty() {
                    description = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    if !atoms.is_empty() {
        frames.push(Model::from_atoms(atoms));
    }
    if frames.is_empty() {
        return Err(BgfError::NoAtoms);
    }
    debug!(frames = frames.len(), "Parsed BGF document.");
    Ok(BgfDocument {
        description,
        frames,
    })
}

pub fn parse_str(text: &str) -> Result<BgfDocument, BgfError> {
    read_from(io::Cursor::new(text))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn atom_line_fixture_is_eighty_columns() {
        assert_eq!(atom_line("ATOM", 1, "CA", "GLY", 'A', 1, [0.0; 3]).len(), 80);
    }

    #[test]
    fn reads_frames_and_description() {
        let doc = parse_str(&two_frame_bgf()).unwrap();
        assert_eq!(doc.description.as_deref(), Some("small test system"));
        assert_eq!(doc.frames.len(), 2);

        let first = &doc.frames[0];
        assert_eq!(first.atom_count(), 3);
        assert_eq!(first.residue_count(), 3);
        assert_eq!(first.chain_ids(), vec!['A', 'W']);
        let water = first.atom(2).unwrap();
        assert!(water.hetero);
        assert_eq!(water.res_name, "HOH");
        assert!((doc.frames[1].atom(0).unwrap().position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_frame_without_end_is_kept() {
        let line = atom_line("ATOM", 1, "N", "GLY", 'A', 1, [1.0, 2.0, 3.0]);
        let doc = parse_str(&line).unwrap();
        assert_eq!(doc.frames.len(), 1);
        assert!((doc.frames[0].atom(0).unwrap().charge - 0.1).abs() < 1e-9);
    }

    #[test]
    fn short_atom_lines_are_rejected() {
        let err = parse_str("ATOM      1 N    GLY A    1").unwrap_err();
        assert!(matches!(
            err,
            BgfError::Parse {
                line: 1,
                kind: BgfParseErrorKind::LineTooShort
            }
        ));
    }

    #[test]
    fn bad_coordinates_report_their_columns() {
        let mut line = atom_line("ATOM", 1, "N", "GLY", 'A', 1, [1.0, 2.0, 3.0]);
        line.replace_range(30..40, "      abcd");
        let err = parse_str(&line).unwrap_err();
        match err {
            BgfError::Parse { kind, .. } => assert_eq!(
                kind,
                BgfParseErrorKind::InvalidFloat {
                    columns: "31-40",
                    value: "abcd".into()
                }
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_serials_within_a_frame_are_rejected() {
        let line = atom_line("ATOM", 7, "N", "GLY", 'A', 1, [0.0; 3]);
        let text = format!("{line}\n{line}\n");
        assert!(matches!(parse_str(&text), Err(BgfError::Inconsistency(_))));
    }

    #[test]
    fn documents_without_atoms_are_rejected() {
        assert!(matches!(parse_str("BIOGRF 332\nEND\n"), Err(BgfError::NoAtoms)));
    }
}
