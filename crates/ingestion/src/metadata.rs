//! Snapshot file naming.
//!
//! SCHISM numbers its output stacks `out2d_1.nc`, `out2d_2.nc`, ...;
//! lexicographic order would put `out2d_10.nc` before `out2d_2.nc`.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Detected file type based on extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// NetCDF format (SCHISM output)
    NetCdf,
    /// Unknown format
    Unknown,
}

/// Detect file type from path.
pub fn detect_file_type(path: &Path) -> FileType {
    let lower = path.to_string_lossy().to_lowercase();
    if lower.ends_with(".nc") || lower.ends_with(".nc4") || lower.ends_with(".netcdf") {
        FileType::NetCdf
    } else {
        FileType::Unknown
    }
}

/// Stack number of a SCHISM output file name, e.g. 12 for `out2d_12.nc`.
pub fn stack_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let (_, digits) = stem.rsplit_once('_')?;
    digits.parse().ok()
}

/// Natural-order comparison of file names: digit runs compare numerically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let (na, ra) = split_digits(a);
                let (nb, rb) = split_digits(b);
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = ra;
                b = rb;
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                a = &a[ca.len_utf8()..];
                b = &b[cb.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Sort snapshot paths by file name in natural order.
pub fn sort_snapshots(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        let an = a.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
        let bn = b.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
        natural_cmp(&an, &bn).then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(detect_file_type(Path::new("out2d_1.nc")), FileType::NetCdf);
        assert_eq!(detect_file_type(Path::new("OUT.NC4")), FileType::NetCdf);
        assert_eq!(detect_file_type(Path::new("param.nml")), FileType::Unknown);
    }

    #[test]
    fn test_stack_number() {
        assert_eq!(stack_number(Path::new("/data/out2d_12.nc")), Some(12));
        assert_eq!(stack_number(Path::new("out2d.nc")), None);
        assert_eq!(stack_number(Path::new("out2d_x.nc")), None);
    }

    #[test]
    fn test_natural_sort() {
        let mut paths: Vec<PathBuf> = ["out2d_10.nc", "out2d_2.nc", "out2d_1.nc", "out2d_02.nc"]
            .iter()
            .map(PathBuf::from)
            .collect();
        sort_snapshots(&mut paths);
        let names: Vec<_> = paths.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["out2d_1.nc", "out2d_2.nc", "out2d_02.nc", "out2d_10.nc"]);
    }

    #[test]
    fn test_natural_cmp_text() {
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("out2d_9", "out2d_9"), Ordering::Equal);
        assert_eq!(natural_cmp("out2d_9", "out2d_9a"), Ordering::Less);
    }
}
